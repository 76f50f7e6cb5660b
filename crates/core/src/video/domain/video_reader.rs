use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// A source of RGB frames: a video file or a live capture device.
///
/// `open` takes whatever locator the source understands (a file path, or a
/// device such as `/dev/video0`). File sources end; live sources yield
/// frames until closed.
pub trait VideoReader: Send {
    fn open(&mut self, source: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Frames in decode order, indexed from 0.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
