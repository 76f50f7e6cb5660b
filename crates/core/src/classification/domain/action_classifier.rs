use thiserror::Error;

use crate::attention::domain::frame_batcher::pad_with_last;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("cannot classify an empty clip")]
    EmptyClip,
    #[error("model predicted class {0}, which has no label")]
    UnknownLabel(usize),
    #[error("classifier expects RGB frames, got {0} channels")]
    UnsupportedFrame(u8),
    #[error("unexpected classifier output: {0}")]
    BadOutput(String),
}

/// Domain interface for clip-level action recognition.
///
/// `frames` is one batch of attention crops in temporal order. The result
/// is the human-readable label of the most likely action.
pub trait ActionClassifier: Send {
    fn classify(&mut self, frames: &[Frame]) -> Result<String, Box<dyn std::error::Error>>;
}

/// Copy `frames` into a clip of exactly `clip_len`, repeating the last frame
/// when short and keeping the earliest frames when long.
pub fn fit_clip(frames: &[Frame], clip_len: usize) -> Result<Vec<Frame>, ClassifierError> {
    if frames.is_empty() {
        return Err(ClassifierError::EmptyClip);
    }
    let mut clip: Vec<Frame> = frames.iter().take(clip_len).cloned().collect();
    pad_with_last(&mut clip, clip_len);
    Ok(clip)
}

/// Index of the largest logit. Ties resolve to the lowest index.
pub fn argmax(logits: &[f32]) -> Result<usize, ClassifierError> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in logits.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| ClassifierError::BadOutput("no finite logits".into()))
}
