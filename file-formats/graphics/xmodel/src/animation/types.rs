//! Keyframe tracks and animation sets

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::node::{NodeId, NodeTree};
use crate::structure::{Identity, Structure, StructureType, identity_eq};
use crate::transform::TransformSlot;

/// Interpolation mode stored with a key
///
/// Every mode is currently sampled linearly; tangent controls are kept on the
/// key for round-tripping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum Interpolation {
    Unknown = -1,
    #[default]
    Linear = 0,
    Bezier = 1,
}

impl Interpolation {
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Linear,
            1 => Self::Bezier,
            _ => Self::Unknown,
        }
    }

    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// One keyframe of a track
#[derive(Debug)]
pub struct AnimationKey {
    identity: Identity,
    pub interpolation: Interpolation,
    pub time: f64,
    pub before_time: f64,
    pub after_time: f64,
    /// Number of components in one value
    pub value_size: usize,
    pub value: Vec<f32>,
    pub before_value: Vec<f32>,
    pub after_value: Vec<f32>,
}

identity_eq!(AnimationKey);

impl Structure for AnimationKey {
    fn structure_type(&self) -> StructureType {
        StructureType::AnimationKey
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl AnimationKey {
    /// Linear key holding `value` at `time`
    pub fn new(time: f64, value: Vec<f32>) -> Self {
        Self {
            identity: Identity::next(),
            interpolation: Interpolation::Linear,
            time,
            before_time: time,
            after_time: time,
            value_size: value.len(),
            value,
            before_value: Vec::new(),
            after_value: Vec::new(),
        }
    }

    /// Key with Bezier tangent controls
    pub fn bezier(
        time: f64,
        value: Vec<f32>,
        before: (f64, Vec<f32>),
        after: (f64, Vec<f32>),
    ) -> Self {
        Self {
            interpolation: Interpolation::Bezier,
            before_time: before.0,
            before_value: before.1,
            after_time: after.0,
            after_value: after.1,
            ..Self::new(time, value)
        }
    }
}

/// Transform a track writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationTarget {
    pub node: NodeId,
    pub slot: TransformSlot,
}

impl AnimationTarget {
    pub const fn new(node: NodeId, slot: TransformSlot) -> Self {
        Self { node, slot }
    }
}

/// A keyframe track, optionally with child tracks
///
/// A track without a target only groups its children. `component` selects a
/// single float of the target value; `None` writes the whole value.
#[derive(Debug)]
pub struct Animation {
    identity: Identity,
    pub name: String,
    pub target: Option<AnimationTarget>,
    pub component: Option<usize>,
    pub keys: Vec<AnimationKey>,
    pub children: Vec<Animation>,
}

identity_eq!(Animation);

impl Structure for Animation {
    fn structure_type(&self) -> StructureType {
        StructureType::Animation
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl Animation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: Identity::next(),
            name: name.into(),
            target: None,
            component: None,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_target(mut self, node: NodeId, slot: TransformSlot) -> Self {
        self.target = Some(AnimationTarget::new(node, slot));
        self
    }

    #[must_use]
    pub fn with_component(mut self, index: usize) -> Self {
        self.component = Some(index);
        self
    }

    #[must_use]
    pub fn with_keys(mut self, keys: Vec<AnimationKey>) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Time of the latest last key in this track and its descendants
    pub fn total_time(&self) -> f64 {
        let own = self.keys.last().map_or(0.0, |key| key.time);
        self.children
            .iter()
            .map(Self::total_time)
            .fold(own, f64::max)
    }

    /// Check this track and its children against `tree`
    ///
    /// Every target must name an existing node and an occupied transform
    /// slot, component offsets must fit the target kind, and every key must
    /// carry enough components.
    pub fn validate(&self, tree: &NodeTree) -> Result<()> {
        if let Some(target) = self.target {
            let node = tree.node(target.node)?;
            let transform = node
                .transform(target.slot)
                .ok_or(ModelError::EmptyTransformSlot {
                    node: target.node,
                    slot: target.slot,
                })?;
            let size = transform.size();

            let expected = match self.component {
                Some(index) if index >= size => {
                    return Err(ModelError::ComponentOutOfRange { index, size });
                }
                Some(_) => 1,
                None => size,
            };
            if let Some(key) = self.keys.iter().find(|key| key.value.len() < expected) {
                return Err(ModelError::KeySizeMismatch {
                    animation: self.name.clone(),
                    expected,
                    actual: key.value.len(),
                });
            }
        }

        self.children.iter().try_for_each(|child| child.validate(tree))
    }
}

/// Named collection of animation trees played together
#[derive(Debug)]
pub struct AnimationSet {
    identity: Identity,
    pub name: String,
    pub animations: Vec<Animation>,
}

identity_eq!(AnimationSet);

impl Structure for AnimationSet {
    fn structure_type(&self) -> StructureType {
        StructureType::AnimationSet
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl AnimationSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            identity: Identity::next(),
            name: name.into(),
            animations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animations.push(animation);
        self
    }

    /// Length of the set in track time units
    pub fn total_time(&self) -> f64 {
        self.animations
            .iter()
            .map(Animation::total_time)
            .fold(0.0, f64::max)
    }

    pub fn validate(&self, tree: &NodeTree) -> Result<()> {
        self.animations.iter().try_for_each(|a| a.validate(tree))
    }
}
