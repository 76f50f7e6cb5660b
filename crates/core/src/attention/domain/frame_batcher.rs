use crate::shared::constants::DEFAULT_BATCH_SIZE;
use crate::shared::frame::Frame;

/// Crops collected since the last full batch.
#[derive(Clone, Debug, Default)]
pub struct BatcherState {
    pub pending: Vec<Frame>,
}

impl BatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Groups attention crops into fixed-length clips for the classifier.
#[derive(Clone, Debug)]
pub struct FrameBatcher {
    batch_size: usize,
}

impl FrameBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Adds a crop. Returns the full batch, leaving `state` empty, once
    /// `batch_size` crops have accumulated.
    pub fn push(&self, state: &mut BatcherState, crop: Frame) -> Option<Vec<Frame>> {
        state.pending.push(crop);
        if state.pending.len() >= self.batch_size {
            Some(std::mem::take(&mut state.pending))
        } else {
            None
        }
    }

    /// Drains the end-of-stream remainder, padded to `batch_size` by
    /// repeating its last crop. `None` when nothing is pending.
    pub fn finish(&self, state: &mut BatcherState) -> Option<Vec<Frame>> {
        if state.pending.is_empty() {
            return None;
        }
        let mut batch = std::mem::take(&mut state.pending);
        pad_with_last(&mut batch, self.batch_size);
        Some(batch)
    }
}

impl Default for FrameBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

/// Extends `frames` to `len` by cloning its last element. No-op when empty
/// or already long enough.
pub fn pad_with_last(frames: &mut Vec<Frame>, len: usize) {
    if let Some(last) = frames.last().cloned() {
        frames.resize(len.max(frames.len()), last);
    }
}
