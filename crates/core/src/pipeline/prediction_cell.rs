use std::sync::{Arc, RwLock};

/// The most recent clip label, written by the classification worker and
/// read by the display loop. Cloning shares the same cell.
#[derive(Clone, Debug, Default)]
pub struct PredictionCell {
    inner: Arc<RwLock<Option<String>>>,
}

impl PredictionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, label: impl Into<String>) {
        let label = label.into();
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(label),
            Err(poisoned) => *poisoned.into_inner() = Some(label),
        }
    }
}
