use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for person detection.
///
/// Implementations may be stateful (e.g., tracking across frames),
/// hence `&mut self`. Boxes are in the pixel space of `frame`.
pub trait PersonDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
