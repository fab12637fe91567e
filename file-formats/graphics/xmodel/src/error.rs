use thiserror::Error;

use crate::node::NodeId;
use crate::transform::TransformSlot;

/// Error types for building and driving a model
///
/// These are only raised while a model is assembled (nodes attached,
/// skins and animation sets registered). The per-tick pipeline never fails:
/// degenerate data there falls back to identity values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A node handle does not belong to the tree it was used with
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// An animation targets a transform slot that holds no transform
    #[error("Node {node} has no transform in the {slot:?} slot")]
    EmptyTransformSlot { node: NodeId, slot: TransformSlot },

    /// A scalar track addresses a component past the end of its target value
    #[error("Component index {index} out of range for a value of size {size}")]
    ComponentOutOfRange { index: usize, size: usize },

    /// A key does not carry enough components for its target
    #[error("Animation '{animation}' has a key with {actual} components, expected at least {expected}")]
    KeySizeMismatch {
        animation: String,
        expected: usize,
        actual: usize,
    },

    /// Skin layout is inconsistent
    #[error("Invalid skin: {0}")]
    InvalidSkin(String),

    /// Playback requested for an animation set the model does not have
    #[error("Animation set not found: {0}")]
    AnimationSetNotFound(usize),

    /// Time rate must be finite and positive
    #[error("Invalid time rate: {0}")]
    InvalidTimeRate(f64),
}

/// Result type using ModelError
pub type Result<T> = std::result::Result<T, ModelError>;
