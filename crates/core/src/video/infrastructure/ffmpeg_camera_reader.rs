use std::path::Path;

use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::ffmpeg_decode::RgbDecoder;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("capture backend {0:?} is not available in this ffmpeg build")]
    BackendUnavailable(String),
    #[error("failed to open camera {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("camera {0} did not open as an input device")]
    NotAnInput(String),
}

/// Requested capture geometry. Drivers may round to the nearest mode they
/// support; the opened metadata reports what was actually granted.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// libavdevice input format (`v4l2`, `avfoundation`, `dshow`).
    pub backend: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl CameraConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            backend: default_backend().to_string(),
            width,
            height,
            fps,
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    /// Demuxer options understood by the common capture backends.
    fn options(&self) -> ffmpeg_next::Dictionary<'static> {
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", self.width, self.height));
        options.set("framerate", &format_rate(self.fps));
        options
    }
}

/// The platform's usual capture backend.
pub fn default_backend() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "v4l2"
    }
}

/// The default device locator for the platform's backend.
pub fn default_device() -> &'static str {
    if cfg!(target_os = "macos") {
        "0"
    } else if cfg!(target_os = "windows") {
        "video=Integrated Camera"
    } else {
        "/dev/video0"
    }
}

fn format_rate(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}", fps as u32)
    } else {
        format!("{fps:.3}")
    }
}

/// Live capture through libavdevice. Its frame iterator does not end on its
/// own; callers stop pulling and `close` the reader.
pub struct FfmpegCameraReader {
    config: CameraConfig,
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<RgbDecoder>,
}

// Safety: FfmpegCameraReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraReader {}

impl FfmpegCameraReader {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            input_ctx: None,
            decoder: None,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    fn open_device(
        &self,
        device: &Path,
    ) -> Result<ffmpeg_next::format::context::Input, CameraError> {
        let device_name = device.display().to_string();
        let backend = ffmpeg_next::device::input::video()
            .find(|fmt| fmt.name() == self.config.backend)
            .ok_or_else(|| CameraError::BackendUnavailable(self.config.backend.clone()))?;

        let ctx = ffmpeg_next::format::open_with(
            device,
            &ffmpeg_next::format::format::Format::Input(backend),
            self.config.options(),
        )
        .map_err(|source| CameraError::Open {
            device: device_name.clone(),
            source,
        })?;

        match ctx {
            ffmpeg_next::format::context::Context::Input(ictx) => Ok(ictx),
            ffmpeg_next::format::context::Context::Output(_) => {
                Err(CameraError::NotAnInput(device_name))
            }
        }
    }
}

impl VideoReader for FfmpegCameraReader {
    fn open(&mut self, device: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let ictx = self.open_device(device)?;
        let (decoder, info) = RgbDecoder::open(&ictx)?;

        let fps = if info.fps > 0.0 { info.fps } else { self.config.fps };
        log::info!(
            "Camera {} opened via {}: {}x{} @ {:.1} fps",
            device.display(),
            self.config.backend,
            info.width,
            info.height,
            fps
        );

        self.input_ctx = Some(ictx);
        self.decoder = Some(decoder);
        Ok(VideoMetadata {
            width: info.width,
            height: info.height,
            fps,
            total_frames: 0,
            codec: info.codec,
            source_path: None,
        })
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        match (self.input_ctx.as_mut(), self.decoder.as_mut()) {
            (Some(ictx), Some(decoder)) => Box::new(decoder.frames(ictx)),
            _ => Box::new(std::iter::once(Err("FfmpegCameraReader: not opened".into()))),
        }
    }

    fn close(&mut self) {
        if self.input_ctx.is_some() {
            log::debug!("Releasing camera");
        }
        self.decoder = None;
        self.input_ctx = None;
    }
}

impl Drop for FfmpegCameraReader {
    fn drop(&mut self) {
        self.close();
    }
}
