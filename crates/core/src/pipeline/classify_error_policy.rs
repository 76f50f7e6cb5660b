/// What a pipeline does when the classifier fails on a clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassifyErrorPolicy {
    /// Log a warning and keep the previous prediction.
    Ignore,
    /// Abort the run with the classifier's error.
    Propagate,
}

impl ClassifyErrorPolicy {
    /// `Ok(Some(label))` on success, `Ok(None)` for an ignored failure.
    pub fn handle(
        self,
        result: Result<String, Box<dyn std::error::Error>>,
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        match (result, self) {
            (Ok(label), _) => Ok(Some(label)),
            (Err(e), ClassifyErrorPolicy::Ignore) => {
                log::warn!("Classification failed, keeping previous prediction: {e}");
                Ok(None)
            }
            (Err(e), ClassifyErrorPolicy::Propagate) => Err(e),
        }
    }
}
