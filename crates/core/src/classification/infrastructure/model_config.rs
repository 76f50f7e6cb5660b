use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelConfigError {
    #[error("failed to read model config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("model config label key {0:?} is not a class index")]
    BadLabelKey(String),
    #[error("model config has no id2label entries")]
    NoLabels,
}

/// The parts of a Hugging Face `config.json` the classifier needs.
#[derive(Debug, Deserialize)]
struct RawConfig {
    id2label: HashMap<String, String>,
    #[serde(default)]
    num_frames: Option<usize>,
    #[serde(default)]
    image_size: Option<u32>,
}

/// Class labels and clip geometry of a video classification model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    labels: HashMap<usize, String>,
    pub num_frames: Option<usize>,
    pub image_size: Option<u32>,
}

impl ModelConfig {
    pub fn load(path: &Path) -> Result<Self, ModelConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ModelConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        if raw.id2label.is_empty() {
            return Err(ModelConfigError::NoLabels);
        }
        let labels = raw
            .id2label
            .into_iter()
            .map(|(key, label)| {
                key.trim()
                    .parse::<usize>()
                    .map(|id| (id, label))
                    .map_err(|_| ModelConfigError::BadLabelKey(key))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self {
            labels,
            num_frames: raw.num_frames,
            image_size: raw.image_size,
        })
    }

    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}
