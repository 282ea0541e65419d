//! Animation Settings
//!
//! Tunables for [`AnimationController`](crate::AnimationController).
//!
//! ```rust,ignore
//! use strider_animation::{AnimationSettings, PausedSchedulePolicy};
//!
//! let settings = AnimationSettings::from_json(r#"{ "time_scale": 0.5 }"#)?;
//! assert_eq!(settings.paused_schedule, PausedSchedulePolicy::StayPaused);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strider_core::{Result, StriderError};

/// What [`schedule`](crate::AnimationController::schedule) does to a paused
/// controller whose running set was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PausedSchedulePolicy {
    /// Keep the controller paused until [`resume`](crate::AnimationController::resume).
    #[default]
    StayPaused,
    /// Switch to running, as scheduling into an empty set always does.
    Resume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Multiplier applied to every frame delta.
    pub time_scale: f32,
    /// Ceiling, in seconds, for a single frame delta.
    pub max_frame_delta: f32,
    /// Capacity hint for the running set and clip pool.
    pub initial_capacity: usize,
    pub paused_schedule: PausedSchedulePolicy,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            max_frame_delta: 0.25,
            initial_capacity: 32,
            paused_schedule: PausedSchedulePolicy::default(),
        }
    }
}

impl AnimationSettings {
    /// Parses and validates settings. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading animation settings from {}", path.display());
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(StriderError::invalid_setting(
                "time_scale",
                format!("must be finite and non-negative, got {}", self.time_scale),
            ));
        }
        if !self.max_frame_delta.is_finite() || self.max_frame_delta <= 0.0 {
            return Err(StriderError::invalid_setting(
                "max_frame_delta",
                format!("must be finite and positive, got {}", self.max_frame_delta),
            ));
        }
        Ok(())
    }

    /// Clamps and scales a raw frame delta. Negative or non-finite input
    /// yields zero.
    #[must_use]
    pub fn scale_delta(&self, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        dt.min(self.max_frame_delta) * self.time_scale
    }
}
