//! Runtime core for X model scenes
//!
//! Holds a model's node hierarchy, samples keyframe animation into it,
//! composes world matrices and skins vertices on the CPU. One tick runs in a
//! fixed order:
//!
//! 1. [`animation::evaluate_animation_set`] writes animated transform values
//! 2. [`animation::update_combination`] rebuilds every node's combined matrix,
//!    parents before children
//! 3. [`skinning::update_matrix_palette`] and [`skinning::update_vertices`]
//!    deform the mesh from the composed bones
//!
//! [`animation::Animator`] runs steps 1 and 2 for a [`Model`];
//! [`skinning::Skinner`] runs step 3.

pub mod animation;
pub mod error;
pub mod math;
pub mod model;
pub mod node;
pub mod skin;
pub mod skinning;
pub mod structure;
pub mod transform;

// Re-export common types
pub use animation::{Animation, AnimationKey, AnimationSet, Animator, PlaybackOptions};
pub use error::{ModelError, Result};
pub use model::Model;
pub use node::{Node, NodeId, NodeTree};
pub use skin::Skin;
pub use skinning::{Skinner, SkinningOptions};
pub use structure::{Identity, Structure, StructureType};
pub use transform::{AxisAngle, BlendSlot, Transform, TransformSlot};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
