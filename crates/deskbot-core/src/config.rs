//! Runtime configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use deskbot_body::{Emotion, ServoConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::debounce::EmotionDebouncer;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-joint servo roster.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Roster {
    pub base: ServoConfig,
    pub torso: ServoConfig,
    pub head: ServoConfig,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            base: ServoConfig::new(1, 3.2),
            torso: ServoConfig::new(3, 2.0),
            head: ServoConfig::new(0, 24.0 / 11.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub servos: Roster,

    /// Per-emotion confidence threshold overrides, keyed by label.
    pub thresholds: HashMap<String, f64>,
    /// Consecutive agreeing classifier frames needed to commit an emotion.
    pub consistent_frames: usize,
    /// Classifier frames older than this cannot support a commit.
    pub emotion_horizon_secs: f64,

    /// Decision loop period.
    pub tick_secs: f64,
    /// Minimum spacing between state commits.
    pub cooldown_secs: f64,
    /// Dwell time in the emotion state.
    pub hold_secs: f64,
    /// Face absence tolerated before tracking gives up.
    pub tracking_grace_secs: f64,

    /// Face displacement treated as centered (fraction of frame width).
    pub center_tolerance: f64,

    /// How often the idle state considers fidgeting.
    pub fidget_interval_secs: f64,
    /// Chance a considered fidget actually runs.
    pub fidget_probability: f64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            servos: Roster::default(),
            thresholds: HashMap::new(),
            consistent_frames: 2,
            emotion_horizon_secs: 2.0,
            tick_secs: 0.5,
            cooldown_secs: 0.5,
            hold_secs: 4.0,
            tracking_grace_secs: 5.0,
            center_tolerance: 0.1,
            fidget_interval_secs: 3.0,
            fidget_probability: 0.1,
        }
    }
}

impl RobotConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Roster in stack order (base, torso, head).
    pub fn roster(&self) -> [ServoConfig; 3] {
        [self.servos.base, self.servos.torso, self.servos.head]
    }

    /// Build the debouncer, applying threshold overrides. Unknown labels
    /// are logged and skipped.
    pub fn debouncer(&self) -> EmotionDebouncer {
        let mut debouncer =
            EmotionDebouncer::new(self.consistent_frames, self.emotion_horizon());
        for (label, &threshold) in &self.thresholds {
            match label.parse::<Emotion>() {
                Ok(emotion) => debouncer.set_threshold(emotion, threshold),
                Err(_) => warn!("Ignoring threshold for unknown emotion '{}'", label),
            }
        }
        debouncer
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs_f64(self.tick_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_secs)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_secs_f64(self.hold_secs)
    }

    pub fn tracking_grace(&self) -> Duration {
        Duration::from_secs_f64(self.tracking_grace_secs)
    }

    pub fn emotion_horizon(&self) -> Duration {
        Duration::from_secs_f64(self.emotion_horizon_secs)
    }

    pub fn fidget_interval(&self) -> Duration {
        Duration::from_secs_f64(self.fidget_interval_secs)
    }
}
