use std::path::{Path, PathBuf};

use crate::pipeline::display_sink::DisplaySink;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Writes annotated frames to a video file, scaled back to the source
/// resolution given at `start`.
pub struct VideoFileSink {
    writer: Box<dyn VideoWriter>,
    path: PathBuf,
    size: Option<(u32, u32)>,
    last_label: Option<String>,
}

impl VideoFileSink {
    pub fn new(writer: Box<dyn VideoWriter>, path: &Path) -> Self {
        Self {
            writer,
            path: path.to_path_buf(),
            size: None,
            last_label: None,
        }
    }

    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }
}

impl DisplaySink for VideoFileSink {
    fn start(&mut self, metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
        self.writer.open(&self.path, metadata)?;
        self.size = Some((metadata.width, metadata.height));
        log::info!("Writing annotated video to {}", self.path.display());
        Ok(())
    }

    fn show_frame(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = self.size.ok_or("VideoFileSink: not started")?;
        if frame.width() == width && frame.height() == height {
            self.writer.write(frame)
        } else {
            self.writer.write(&frame.resized(width, height))
        }
    }

    fn show_label(&mut self, label: &str) {
        self.last_label = Some(label.to_string());
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.size = None;
        self.writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        opened: Option<(PathBuf, u32, u32)>,
        frames: Vec<(u32, u32)>,
        closed: bool,
    }

    struct RecordingWriter(Arc<Mutex<Recorded>>);

    impl VideoWriter for RecordingWriter {
        fn open(
            &mut self,
            path: &Path,
            metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().opened =
                Some((path.to_path_buf(), metadata.width, metadata.height));
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.0
                .lock()
                .unwrap()
                .frames
                .push((frame.width(), frame.height()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().closed = true;
            Ok(())
        }
    }

    fn metadata(width: u32, height: u32) -> VideoMetadata {
        VideoMetadata {
            width,
            height,
            fps: 15.0,
            total_frames: 0,
            codec: String::new(),
            source_path: None,
        }
    }

    #[test]
    fn test_frames_are_resized_to_source_resolution() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut sink = VideoFileSink::new(
            Box::new(RecordingWriter(recorded.clone())),
            Path::new("out.mp4"),
        );

        sink.start(&metadata(1280, 720)).unwrap();
        sink.show_frame(&Frame::new(vec![0u8; 640 * 480 * 3], 640, 480, 3, 0))
            .unwrap();
        sink.show_label("normal");
        sink.finish().unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(
            recorded.opened,
            Some((PathBuf::from("out.mp4"), 1280, 720))
        );
        assert_eq!(recorded.frames, vec![(1280, 720)]);
        assert!(recorded.closed);
        assert_eq!(sink.last_label(), Some("normal"));
    }

    #[test]
    fn test_show_frame_before_start_is_error() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut sink =
            VideoFileSink::new(Box::new(RecordingWriter(recorded)), Path::new("out.mp4"));
        assert!(sink
            .show_frame(&Frame::new(vec![0u8; 12], 2, 2, 3, 0))
            .is_err());
    }
}
