use crate::shared::constants::DEFAULT_ATTENTION_SIZE;
use crate::shared::crop_window::CropWindow;
use crate::shared::detection::Point;
use crate::shared::frame::Frame;

/// Cuts the attention window around the selected subject.
#[derive(Clone, Debug)]
pub struct AttentionCropper {
    size: u32,
}

impl AttentionCropper {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn window(&self, center: Point, frame_width: u32, frame_height: u32) -> CropWindow {
        CropWindow::around(center, self.size, frame_width, frame_height)
    }

    /// Crops `frame` (which must be the unannotated copy) around `center`.
    /// Returns `None` when the window misses the frame entirely.
    pub fn crop(&self, frame: &Frame, center: Point) -> Option<(CropWindow, Frame)> {
        let window = self.window(center, frame.width(), frame.height());
        if window.is_empty() {
            return None;
        }
        frame.crop(&window).map(|crop| (window, crop))
    }
}

impl Default for AttentionCropper {
    fn default() -> Self {
        Self::new(DEFAULT_ATTENTION_SIZE)
    }
}
