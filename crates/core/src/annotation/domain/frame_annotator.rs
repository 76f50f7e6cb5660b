use crate::shared::crop_window::CropWindow;
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Everything drawn on top of one frame.
#[derive(Clone, Debug, Default)]
pub struct Overlay<'a> {
    pub detections: &'a [Detection],
    pub attention: Option<CropWindow>,
    pub label: Option<&'a str>,
}

/// Domain interface for drawing review overlays in place.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, overlay: &Overlay<'_>);
}

/// Leaves frames untouched. Used when only labels are wanted.
pub struct NoopAnnotator;

impl FrameAnnotator for NoopAnnotator {
    fn annotate(&self, _frame: &mut Frame, _overlay: &Overlay<'_>) {}
}
