use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    DEFAULT_ATTENTION_SIZE, DEFAULT_BATCH_SIZE, DEFAULT_DETECTION_CONFIDENCE,
    DEFAULT_DISPLACEMENT_THRESHOLD, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
    DEFAULT_GROUP_DISTANCE, DEFAULT_MAX_GROUP_SIZE, DEFAULT_TARGET_FPS,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for the attention pipeline.
///
/// Missing JSON fields fall back to the defaults, so a settings file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Frames are resized to this size before detection and cropping.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Analysis rate for files; capture rate for live sources.
    pub target_fps: f64,
    pub attention_size: u32,
    pub batch_size: usize,
    pub group_distance_threshold: f64,
    pub displacement_threshold: f64,
    pub max_group_size: usize,
    pub detection_confidence: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            attention_size: DEFAULT_ATTENTION_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            group_distance_threshold: DEFAULT_GROUP_DISTANCE,
            displacement_threshold: DEFAULT_DISPLACEMENT_THRESHOLD,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
            detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
        }
    }
}

impl PipelineSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
            SettingsError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(invalid(
                "frame size",
                format!("must be non-zero, got {}x{}", self.frame_width, self.frame_height),
            ));
        }
        if !(self.target_fps > 0.0) {
            return Err(invalid(
                "target_fps",
                format!("must be positive, got {}", self.target_fps),
            ));
        }
        if self.attention_size == 0 {
            return Err(invalid("attention_size", "must be non-zero"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be non-zero"));
        }
        if !(self.group_distance_threshold > 0.0) {
            return Err(invalid(
                "group_distance_threshold",
                format!("must be positive, got {}", self.group_distance_threshold),
            ));
        }
        if !(self.displacement_threshold > 0.0) {
            return Err(invalid(
                "displacement_threshold",
                format!("must be positive, got {}", self.displacement_threshold),
            ));
        }
        if self.max_group_size < 2 {
            return Err(invalid(
                "max_group_size",
                format!("must be at least 2, got {}", self.max_group_size),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection_confidence) {
            return Err(invalid(
                "detection_confidence",
                format!("must be between 0.0 and 1.0, got {}", self.detection_confidence),
            ));
        }
        Ok(())
    }

    /// Timer period for live capture.
    pub fn frame_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps)
    }
}
