use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::attention::domain::frame_batcher::{BatcherState, FrameBatcher};
use crate::classification::domain::action_classifier::ActionClassifier;
use crate::shared::frame::Frame;
use crate::shared::settings::PipelineSettings;
use crate::video::domain::video_reader::VideoReader;

use super::classify_error_policy::ClassifyErrorPolicy;
use super::display_sink::DisplaySink;
use super::frame_analyzer::FrameAnalyzer;
use super::pipeline_logger::PipelineLogger;

/// What an offline run did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationReport {
    pub frames_read: usize,
    pub frames_analyzed: usize,
    pub sample_interval: usize,
    /// `(frame index, label)` for every successful classification.
    pub predictions: Vec<(usize, String)>,
    pub cancelled: bool,
}

impl ClassificationReport {
    pub fn final_prediction(&self) -> Option<&str> {
        self.predictions.last().map(|(_, label)| label.as_str())
    }
}

/// Classifies a recorded video synchronously.
///
/// Every `sample_interval`-th frame is analyzed; each full batch of
/// attention crops is classified before the next frame is read, and the
/// newest label is drawn on every frame shown after it. At end of stream
/// the partial batch is padded and classified once more.
///
/// Single-use: `execute` consumes the owned components.
pub struct ClassifyVideoUseCase {
    reader: Option<Box<dyn VideoReader>>,
    analyzer: Option<FrameAnalyzer>,
    classifier: Option<Box<dyn ActionClassifier>>,
    sink: Option<Box<dyn DisplaySink>>,
    logger: Box<dyn PipelineLogger>,
    settings: PipelineSettings,
    error_policy: ClassifyErrorPolicy,
    cancelled: Arc<AtomicBool>,
}

impl ClassifyVideoUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        analyzer: FrameAnalyzer,
        classifier: Box<dyn ActionClassifier>,
        sink: Box<dyn DisplaySink>,
        logger: Box<dyn PipelineLogger>,
        settings: PipelineSettings,
        error_policy: Option<ClassifyErrorPolicy>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            analyzer: Some(analyzer),
            classifier: Some(classifier),
            sink: Some(sink),
            logger,
            settings,
            error_policy: error_policy.unwrap_or(ClassifyErrorPolicy::Propagate),
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn execute(
        &mut self,
        input: &Path,
    ) -> Result<ClassificationReport, Box<dyn std::error::Error>> {
        let mut reader = self.reader.take().ok_or("Pipeline already executed")?;
        let mut analyzer = self.analyzer.take().ok_or("Pipeline already executed")?;
        let mut classifier = self.classifier.take().ok_or("Pipeline already executed")?;
        let mut sink = self.sink.take().ok_or("Pipeline already executed")?;

        let metadata = reader.open(input)?;
        let interval = metadata.sample_interval(self.settings.target_fps);
        self.logger.info(&format!(
            "{}: {}x{} @ {:.2} fps, analyzing every {interval} frame(s)",
            input.display(),
            metadata.width,
            metadata.height,
            metadata.fps
        ));

        let mut output_meta = metadata.clone();
        if metadata.fps > 0.0 {
            output_meta.fps = metadata.fps / interval as f64;
        }
        sink.start(&output_meta)?;

        let batcher = FrameBatcher::new(self.settings.batch_size);
        let mut pending = BatcherState::new();
        let mut label: Option<String> = None;
        let mut report = ClassificationReport {
            sample_interval: interval,
            ..Default::default()
        };

        let result = (|| -> Result<(), Box<dyn std::error::Error>> {
            for frame_result in reader.frames() {
                if self.cancelled.load(Ordering::Relaxed) {
                    report.cancelled = true;
                    break;
                }
                let frame = frame_result?;
                report.frames_read += 1;
                if frame.index() % interval != 0 {
                    continue;
                }

                let analyzed = analyzer.analyze(&frame, self.logger.as_mut())?;
                report.frames_analyzed += 1;

                if let Some(crop) = analyzed.crop.clone() {
                    if let Some(batch) = batcher.push(&mut pending, crop) {
                        if let Some(new_label) = self.classify(classifier.as_mut(), &batch)? {
                            self.logger.prediction(frame.index(), &new_label);
                            sink.show_label(&new_label);
                            report.predictions.push((frame.index(), new_label.clone()));
                            label = Some(new_label);
                        }
                    }
                }
                self.logger.metric("pending_crops", pending.len() as f64);

                sink.show_frame(&analyzer.render(&analyzed, label.as_deref()))?;
                self.logger.progress(report.frames_read, metadata.total_frames);
            }

            if !report.cancelled {
                if let Some(batch) = batcher.finish(&mut pending) {
                    let last_index = batch.last().map(Frame::index).unwrap_or_default();
                    if let Some(new_label) = self.classify(classifier.as_mut(), &batch)? {
                        self.logger.prediction(last_index, &new_label);
                        sink.show_label(&new_label);
                        report.predictions.push((last_index, new_label));
                    }
                }
            }
            Ok(())
        })();

        reader.close();
        let finished = sink.finish();
        result?;
        finished?;

        self.logger.summary();
        Ok(report)
    }

    fn classify(
        &mut self,
        classifier: &mut dyn ActionClassifier,
        batch: &[Frame],
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        let t0 = Instant::now();
        let result = classifier.classify(batch);
        self.logger
            .timing("classify", t0.elapsed().as_secs_f64() * 1000.0);
        self.error_policy.handle(result)
    }
}
