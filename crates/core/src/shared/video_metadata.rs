use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// 0 when the source does not report a frame count (live devices).
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Every how many source frames one frame is analyzed so that roughly
    /// `target_fps` frames per second reach the detector. Never below 1.
    pub fn sample_interval(&self, target_fps: f64) -> usize {
        if self.fps <= 0.0 || target_fps <= 0.0 {
            return 1;
        }
        ((self.fps / target_fps).round() as usize).max(1)
    }
}
