use std::time::Instant;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::attention::domain::attention_cropper::AttentionCropper;
use crate::attention::domain::grouping::group_people;
use crate::attention::domain::selection_tracker::{SelectionTracker, SelectionTrackerState};
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::crop_window::CropWindow;
use crate::shared::detection::{centroids, Detection, Point};
use crate::shared::frame::Frame;
use crate::shared::settings::PipelineSettings;

use super::pipeline_logger::PipelineLogger;

/// One frame after detection and subject selection.
#[derive(Clone, Debug)]
pub struct AnalyzedFrame {
    /// The source frame resized to the working resolution, unannotated.
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub subject: Option<Point>,
    pub window: Option<CropWindow>,
    /// Attention crop cut from `frame`, if a subject is selected.
    pub crop: Option<Frame>,
}

/// Per-frame attention stage shared by the offline and live pipelines:
/// resize, detect people, group, select a subject, crop around it.
///
/// Owns the selection state, so one analyzer serves exactly one stream.
pub struct FrameAnalyzer {
    detector: Box<dyn PersonDetector>,
    annotator: Box<dyn FrameAnnotator>,
    cropper: AttentionCropper,
    tracker: SelectionTracker,
    selection: SelectionTrackerState,
    group_distance: f64,
    frame_width: u32,
    frame_height: u32,
}

impl FrameAnalyzer {
    pub fn new(
        detector: Box<dyn PersonDetector>,
        annotator: Box<dyn FrameAnnotator>,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            detector,
            annotator,
            cropper: AttentionCropper::new(settings.attention_size),
            tracker: SelectionTracker::new(
                settings.displacement_threshold,
                settings.max_group_size,
            ),
            selection: SelectionTrackerState::new(),
            group_distance: settings.group_distance_threshold,
            frame_width: settings.frame_width,
            frame_height: settings.frame_height,
        }
    }

    pub fn selection(&self) -> &SelectionTrackerState {
        &self.selection
    }

    pub fn analyze(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<AnalyzedFrame, Box<dyn std::error::Error>> {
        let resized = frame.resized(self.frame_width, self.frame_height);

        let t0 = Instant::now();
        let mut detections = self.detector.detect(&resized)?;
        logger.timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        detections.retain(Detection::is_person);
        logger.metric("people", detections.len() as f64);

        let points = centroids(&detections);
        let groups = group_people(&points, self.group_distance);
        let subject = self.tracker.select(&mut self.selection, &groups, &points);

        let (window, crop) = match subject.and_then(|center| self.cropper.crop(&resized, center)) {
            Some((window, crop)) => (Some(window), Some(crop)),
            None => (None, None),
        };

        Ok(AnalyzedFrame {
            frame: resized,
            detections,
            subject,
            window,
            crop,
        })
    }

    /// Draws person boxes, the attention window and `label` on a copy of
    /// the analyzed frame.
    pub fn render(&self, analyzed: &AnalyzedFrame, label: Option<&str>) -> Frame {
        let mut out = analyzed.frame.clone();
        self.annotator.annotate(
            &mut out,
            &Overlay {
                detections: &analyzed.detections,
                attention: analyzed.window,
                label,
            },
        );
        out
    }
}
