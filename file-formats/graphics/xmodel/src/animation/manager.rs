//! Playback driver
//!
//! The [`Animator`] keeps a clock for the active animation set and runs one
//! tick of the pipeline against a [`Model`]: restore the pose, sample the
//! set into the configured blend slot, then recompose world matrices. Skinning
//! reads the composed matrices afterwards.

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::transform::BlendSlot;

/// Playback settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct PlaybackOptions {
    /// Wrap around at the end of the set instead of holding the last pose
    pub looping: bool,
    /// Working value the keyframes are written to
    pub slot: BlendSlot,
    /// Weight used when composing; 0 shows the base pose, 1 the animation
    pub blend_weight: f32,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            looping: false,
            slot: BlendSlot::Animated,
            blend_weight: 1.0,
        }
    }
}

/// Clock and active set for one model
///
/// The animator remembers which set it last applied so later ticks skip the
/// full pose reset. Call [`Animator::play`] before driving a different model.
#[derive(Debug, Clone, Default)]
pub struct Animator {
    options: PlaybackOptions,
    current: Option<usize>,
    applied: Option<usize>,
    /// Seconds since the current set started
    time: f64,
}

impl Animator {
    pub fn new(options: PlaybackOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub const fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    pub const fn options_mut(&mut self) -> &mut PlaybackOptions {
        &mut self.options
    }

    /// Start an animation set from its beginning
    pub fn play(&mut self, index: usize) {
        self.current = Some(index);
        self.applied = None;
        self.time = 0.0;
    }

    /// Stop playback; the model keeps its last pose
    pub fn stop(&mut self) {
        self.current = None;
        self.applied = None;
        self.time = 0.0;
    }

    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Advance the clock by `delta` seconds
    pub fn advance(&mut self, delta: f64) {
        if self.current.is_some() {
            self.time += delta;
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        self.time = seconds;
    }

    /// Whether a non-looping set has reached its end
    pub fn is_finished(&self, model: &Model) -> bool {
        match self.current {
            Some(index) if !self.options.looping => model
                .animation_total_time(index)
                .is_ok_and(|total| self.time >= total),
            _ => false,
        }
    }

    /// Pose `model` for the current time
    ///
    /// Switching to another set first restores the full bind pose so no
    /// values of the previous set leak through. Does nothing while stopped.
    pub fn apply(&mut self, model: &mut Model) -> Result<()> {
        let Some(index) = self.current else {
            return Ok(());
        };
        if index >= model.animation_sets().len() {
            return Err(ModelError::AnimationSetNotFound(index));
        }

        if self.applied == Some(index) {
            model.nodes_mut().reset_transforms();
        } else {
            log::debug!("Switching animation set to {index} on '{}'", model.name);
            model.reset_pose();
            self.applied = Some(index);
        }

        model.set_animation(index, self.time, self.options.looping, self.options.slot)?;
        model.update_combination(self.options.blend_weight);
        Ok(())
    }
}
