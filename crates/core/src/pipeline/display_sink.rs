use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Where annotated frames and label updates go.
///
/// `start` receives the metadata of the stream that will be shown (source
/// resolution, output frame rate); `finish` is called once after the last
/// frame.
pub trait DisplaySink: Send {
    fn start(&mut self, _metadata: &VideoMetadata) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    fn show_frame(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn show_label(&mut self, label: &str);

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

/// Drops frames and reports label changes through `log`.
#[derive(Default)]
pub struct LogSink {
    frames: usize,
    current: Option<String>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> usize {
        self.frames
    }
}

impl DisplaySink for LogSink {
    fn show_frame(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.frames += 1;
        Ok(())
    }

    fn show_label(&mut self, label: &str) {
        if self.current.as_deref() != Some(label) {
            log::info!("Prediction: {label}");
            self.current = Some(label.to_string());
        }
    }

    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::debug!("Display finished after {} frames", self.frames);
        Ok(())
    }
}
