//! Keyframe animation
//!
//! This module drives node transforms from keyframe tracks:
//! - Track and key data model with whole-value and single-component tracks
//! - Key lookup by binary search and per-kind interpolation
//! - Two-slot blending and hierarchical matrix composition
//! - A playback driver that runs one tick against a [`Model`](crate::Model)
//!
//! # Example
//!
//! ```rust
//! use glam::Vec3;
//! use xmodel::animation::{Animation, AnimationKey, AnimationSet, Animator, PlaybackOptions};
//! use xmodel::node::{Node, NodeTree};
//! use xmodel::transform::{Transform, TransformSlot};
//! use xmodel::Model;
//!
//! let mut tree = NodeTree::new();
//! let hips = tree.add_root(
//!     Node::new("hips").with_transform(TransformSlot::Translate, Transform::translate(Vec3::ZERO)),
//! );
//! let mut model = Model::new("walker", tree);
//! model.set_time_rate(30.0)?;
//!
//! let walk = AnimationSet::new("walk").with_animation(
//!     Animation::new("hips")
//!         .with_target(hips, TransformSlot::Translate)
//!         .with_keys(vec![
//!             AnimationKey::new(0.0, vec![0.0, 0.0, 0.0]),
//!             AnimationKey::new(30.0, vec![0.0, 0.0, 2.0]),
//!         ]),
//! );
//! let walk = model.add_animation_set(walk)?;
//!
//! let mut animator = Animator::new(PlaybackOptions { looping: true, ..Default::default() });
//! animator.play(walk);
//! animator.advance(0.5);
//! animator.apply(&mut model)?;
//!
//! let hips = model.nodes().get(hips).map(|n| n.combined_matrix.w_axis.z);
//! assert_eq!(hips, Some(1.0));
//! # Ok::<(), xmodel::ModelError>(())
//! ```

pub mod compositor;
pub mod interpolation;
pub mod manager;
pub mod types;

pub use compositor::{local_matrix, update_combination, update_combination_from};
pub use interpolation::{KeyBracket, evaluate_animation, evaluate_animation_set, find_key_bracket};
pub use manager::{Animator, PlaybackOptions};
pub use types::{Animation, AnimationKey, AnimationSet, AnimationTarget, Interpolation};
