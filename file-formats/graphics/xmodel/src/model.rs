//! Model container
//!
//! A [`Model`] owns the node tree, the skins bound to it and the animation
//! sets that drive it. Animation sets are authored in track time; the model's
//! `time_rate` converts wall-clock seconds into track time units.

use crate::animation::compositor::update_combination;
use crate::animation::interpolation::evaluate_animation_set;
use crate::animation::types::AnimationSet;
use crate::error::{ModelError, Result};
use crate::node::NodeTree;
use crate::skin::Skin;
use crate::structure::{Identity, Structure, StructureType, identity_eq};
use crate::transform::BlendSlot;

/// Scene graph, skins and animation sets of a loaded model
#[derive(Debug)]
pub struct Model {
    identity: Identity,
    pub name: String,
    nodes: NodeTree,
    skins: Vec<Skin>,
    animation_sets: Vec<AnimationSet>,
    time_rate: f64,
}

identity_eq!(Model);

impl Structure for Model {
    fn structure_type(&self) -> StructureType {
        StructureType::Container
    }

    fn identity(&self) -> Identity {
        self.identity
    }
}

impl Model {
    /// Wrap a node tree, with one track time unit per second
    pub fn new(name: impl Into<String>, nodes: NodeTree) -> Self {
        Self {
            identity: Identity::next(),
            name: name.into(),
            nodes,
            skins: Vec::new(),
            animation_sets: Vec::new(),
            time_rate: 1.0,
        }
    }

    /// Track time units per second, e.g. the authoring frame rate
    pub const fn time_rate(&self) -> f64 {
        self.time_rate
    }

    pub fn set_time_rate(&mut self, time_rate: f64) -> Result<()> {
        if !time_rate.is_finite() || time_rate <= 0.0 {
            return Err(ModelError::InvalidTimeRate(time_rate));
        }
        self.time_rate = time_rate;
        Ok(())
    }

    pub const fn nodes(&self) -> &NodeTree {
        &self.nodes
    }

    pub const fn nodes_mut(&mut self) -> &mut NodeTree {
        &mut self.nodes
    }

    /// Register a skin after checking its bones belong to this model
    pub fn add_skin(&mut self, skin: Skin) -> Result<usize> {
        skin.validate(&self.nodes)?;
        self.skins.push(skin);
        Ok(self.skins.len() - 1)
    }

    pub fn skins(&self) -> &[Skin] {
        &self.skins
    }

    pub fn skins_mut(&mut self) -> &mut [Skin] {
        &mut self.skins
    }

    /// Register an animation set after checking every track target
    pub fn add_animation_set(&mut self, set: AnimationSet) -> Result<usize> {
        set.validate(&self.nodes)?;
        log::debug!(
            "Registered animation set '{}' ({} root tracks, {} time units)",
            set.name,
            set.animations.len(),
            set.total_time()
        );
        self.animation_sets.push(set);
        Ok(self.animation_sets.len() - 1)
    }

    pub fn animation_sets(&self) -> &[AnimationSet] {
        &self.animation_sets
    }

    pub fn find_animation_set(&self, name: &str) -> Option<usize> {
        self.animation_sets.iter().position(|set| set.name == name)
    }

    /// Length of an animation set in seconds
    pub fn animation_total_time(&self, index: usize) -> Result<f64> {
        self.animation_sets
            .get(index)
            .map(|set| set.total_time() / self.time_rate)
            .ok_or(ModelError::AnimationSetNotFound(index))
    }

    /// Sample an animation set at `seconds` into `slot`
    ///
    /// With `looping` the time wraps around the set's length, otherwise it is
    /// clamped to it. Only transform working values are written; call
    /// [`Model::update_combination`] afterwards to refresh world matrices.
    pub fn set_animation(&mut self, index: usize, seconds: f64, looping: bool, slot: BlendSlot) -> Result<()> {
        let set = self
            .animation_sets
            .get(index)
            .ok_or(ModelError::AnimationSetNotFound(index))?;

        let total = set.total_time();
        let time = seconds * self.time_rate;
        let time = if looping && total > 0.0 {
            time.rem_euclid(total)
        } else {
            time.clamp(0.0, total.max(0.0))
        };

        evaluate_animation_set(&mut self.nodes, set, time, slot);
        Ok(())
    }

    /// Restore the bind pose in both working slots and recompose
    pub fn reset_pose(&mut self) {
        self.nodes.reset_transforms();
        update_combination(&mut self.nodes, 0.0);
    }

    /// Recompose world matrices with working values mixed by `weight`
    pub fn update_combination(&mut self, weight: f32) {
        update_combination(&mut self.nodes, weight);
    }

    /// Rebake bind-pose offsets from the initial transform values
    pub fn reset_offsets(&mut self) {
        self.reset_pose();
        self.nodes.update_offsets();
    }
}
