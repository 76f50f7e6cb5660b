use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::attention::domain::frame_batcher::{BatcherState, FrameBatcher};
use crate::classification::domain::action_classifier::ActionClassifier;
use crate::shared::settings::PipelineSettings;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::classify_error_policy::ClassifyErrorPolicy;
use super::display_sink::DisplaySink;
use super::frame_analyzer::FrameAnalyzer;
use super::infrastructure::classification_worker::{ClassificationWorker, WorkerStats};
use super::pipeline_logger::PipelineLogger;
use super::prediction_cell::PredictionCell;

/// Optional bounds on a live run. Both `None` means run until cancelled
/// or the source ends.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StreamLimits {
    pub max_frames: Option<usize>,
    pub duration: Option<Duration>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamReport {
    pub frames_captured: usize,
    pub batches_submitted: usize,
    /// Crops still pending when capture stopped. Never classified.
    pub crops_discarded: usize,
    pub last_prediction: Option<String>,
    pub worker: WorkerStats,
    pub cancelled: bool,
}

/// Live camera pipeline.
///
/// A timer paced at `target_fps` drives capture on the calling thread. Each
/// tick reads one frame, selects the attention region and pushes the crop
/// into the batcher; full batches go to a [`ClassificationWorker`] so
/// inference never stalls capture. Frames are shown with whatever label the
/// worker published last.
pub struct LiveStreamUseCase {
    reader: Box<dyn VideoReader>,
    analyzer: FrameAnalyzer,
    sink: Box<dyn DisplaySink>,
    logger: Box<dyn PipelineLogger>,
    settings: PipelineSettings,
    prediction: PredictionCell,
    worker: ClassificationWorker,
    updates: Receiver<String>,
    cancelled: Arc<AtomicBool>,
    source: Option<VideoMetadata>,
    finished: bool,
}

impl LiveStreamUseCase {
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
        let prediction = PredictionCell::new();
        let (updates_tx, updates) = crossbeam_channel::unbounded();
        let worker = ClassificationWorker::spawn(
            classifier,
            prediction.clone(),
            updates_tx,
            error_policy.unwrap_or(ClassifyErrorPolicy::Ignore),
        );
        Self {
            reader,
            analyzer,
            sink,
            logger,
            settings,
            prediction,
            worker,
            updates,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            source: None,
            finished: false,
        }
    }

    /// Handle for stopping `run` from another thread.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn prediction(&self) -> &PredictionCell {
        &self.prediction
    }

    /// Opens the capture device. Failure is logged and reported as `false`.
    pub fn open_camera(&mut self, device: &Path) -> bool {
        match self.reader.open(device) {
            Ok(metadata) => {
                log::info!(
                    "Camera {} opened: {}x{} @ {:.1} fps",
                    device.display(),
                    metadata.width,
                    metadata.height,
                    metadata.fps
                );
                self.source = Some(metadata);
                true
            }
            Err(e) => {
                log::error!("Failed to open camera {}: {e}", device.display());
                false
            }
        }
    }

    /// Captures until cancelled, a limit is hit or the source ends, then
    /// shuts the worker down. Can only run once.
    pub fn run(&mut self, limits: StreamLimits) -> Result<StreamReport, Box<dyn std::error::Error>> {
        if self.finished {
            return Err("Stream already finished".into());
        }
        let mut metadata = self.source.clone().ok_or("Camera not opened")?;
        if metadata.fps <= 0.0 {
            metadata.fps = self.settings.target_fps;
        }
        self.sink.start(&metadata)?;

        let batcher = FrameBatcher::new(self.settings.batch_size);
        let mut pending = BatcherState::new();
        let mut report = StreamReport::default();
        let ticker = crossbeam_channel::tick(self.settings.frame_period());
        let started = Instant::now();

        let result = (|| -> Result<(), Box<dyn std::error::Error>> {
            let mut frames = self.reader.frames();
            loop {
                if self.cancelled.load(Ordering::Relaxed) {
                    report.cancelled = true;
                    break;
                }
                if limits.max_frames.is_some_and(|max| report.frames_captured >= max)
                    || limits.duration.is_some_and(|d| started.elapsed() >= d)
                {
                    break;
                }
                ticker.recv()?;

                let frame = match frames.next() {
                    Some(frame) => frame?,
                    None => {
                        log::info!("Capture source ended");
                        break;
                    }
                };
                report.frames_captured += 1;

                let analyzed = self.analyzer.analyze(&frame, self.logger.as_mut())?;
                if let Some(crop) = analyzed.crop.clone() {
                    if let Some(batch) = batcher.push(&mut pending, crop) {
                        if self.worker.submit(batch).is_err() {
                            let stats = self.worker.shutdown();
                            return Err(stats
                                .error
                                .unwrap_or_else(|| "Classification worker stopped".to_string())
                                .into());
                        }
                        report.batches_submitted += 1;
                    }
                }

                for label in self.updates.try_iter() {
                    self.logger.prediction(frame.index(), &label);
                    self.sink.show_label(&label);
                }
                let label = self.prediction.get();
                self.sink
                    .show_frame(&self.analyzer.render(&analyzed, label.as_deref()))?;
                self.logger.progress(report.frames_captured, 0);
            }
            Ok(())
        })();
        drop(ticker);

        report.crops_discarded = pending.len();
        if !pending.is_empty() {
            log::debug!("Discarding {} pending crops", pending.len());
        }
        report.worker = self.worker.shutdown();
        for label in self.updates.try_iter() {
            self.sink.show_label(&label);
        }
        report.last_prediction = self.prediction.get();
        self.finished = true;

        let finished = self.sink.finish();
        self.reader.close();
        result?;
        finished?;

        self.logger.summary();
        Ok(report)
    }

    /// Joins the worker and releases the device. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> WorkerStats {
        let stats = self.worker.shutdown();
        self.reader.close();
        self.finished = true;
        stats
    }
}

impl Drop for LiveStreamUseCase {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::annotation::domain::frame_annotator::NoopAnnotator;
    use crate::pipeline::classify_video_use_case::test_support::RecordingClassifier;
    use crate::pipeline::frame_analyzer::test_support::{frame, pair_at, LabelRecorder};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::detection::Detection;
    use crate::shared::frame::Frame;

    /// Camera stand-in: yields `limit` frames (or forever).
    struct FakeCamera {
        limit: Option<usize>,
        fail_open: bool,
        closed: Arc<Mutex<bool>>,
    }

    impl VideoReader for FakeCamera {
        fn open(&mut self, _source: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("no such device".into());
            }
            Ok(VideoMetadata {
                width: 640,
                height: 480,
                fps: 0.0,
                total_frames: 0,
                codec: "rawvideo".to_string(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            let frames = (0..).map(|i| Ok(frame(i, 640, 480)));
            match self.limit {
                Some(n) => Box::new(frames.take(n)),
                None => Box::new(frames),
            }
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    /// Every frame holds the same pair of people.
    struct PairEverywhere(Vec<Detection>);

    impl crate::detection::domain::person_detector::PersonDetector for PairEverywhere {
        fn detect(&mut self, _: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct Shown {
        frames: usize,
        labels: Vec<String>,
        finished: bool,
    }

    struct RecordingSink(Arc<Mutex<Shown>>);

    impl DisplaySink for RecordingSink {
        fn show_frame(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().frames += 1;
            Ok(())
        }

        fn show_label(&mut self, label: &str) {
            self.0.lock().unwrap().labels.push(label.to_string());
        }

        fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            self.0.lock().unwrap().finished = true;
            Ok(())
        }
    }

    struct Harness {
        use_case: LiveStreamUseCase,
        calls: Arc<Mutex<Vec<Vec<Frame>>>>,
        shown: Arc<Mutex<Shown>>,
        closed: Arc<Mutex<bool>>,
    }

    fn harness(
        limit: Option<usize>,
        fail_open: bool,
        classifier: RecordingClassifier,
        calls: Arc<Mutex<Vec<Vec<Frame>>>>,
    ) -> Harness {
        let settings = PipelineSettings {
            target_fps: 1000.0,
            ..Default::default()
        };
        let closed = Arc::new(Mutex::new(false));
        let shown = Arc::new(Mutex::new(Shown::default()));
        let analyzer = FrameAnalyzer::new(
            Box::new(PairEverywhere(pair_at(320, 240))),
            Box::new(NoopAnnotator),
            &settings,
        );
        let use_case = LiveStreamUseCase::new(
            Box::new(FakeCamera {
                limit,
                fail_open,
                closed: closed.clone(),
            }),
            analyzer,
            Box::new(classifier),
            Box::new(RecordingSink(shown.clone())),
            Box::new(NullPipelineLogger),
            settings,
            None,
            None,
        );
        Harness {
            use_case,
            calls,
            shown,
            closed,
        }
    }

    #[test]
    fn test_open_camera_failure_returns_false() {
        let (classifier, calls) = RecordingClassifier::new(&["normal"]);
        let mut h = harness(Some(1), true, classifier, calls);
        assert!(!h.use_case.open_camera(Path::new("/dev/video9")));
        assert!(h.use_case.run(StreamLimits::default()).is_err());
    }

    #[test]
    fn test_full_batches_are_classified_in_background() {
        let (classifier, calls) = RecordingClassifier::new(&["normal", "harassment"]);
        let mut h = harness(Some(32), false, classifier, calls);
        assert!(h.use_case.open_camera(Path::new("/dev/video0")));

        let report = h.use_case.run(StreamLimits::default()).unwrap();

        assert_eq!(report.frames_captured, 32);
        assert_eq!(report.batches_submitted, 2);
        assert_eq!(report.crops_discarded, 0);
        assert_eq!(report.worker.classified, 2);
        assert_eq!(report.last_prediction.as_deref(), Some("harassment"));

        let shown = h.shown.lock().unwrap();
        assert_eq!(shown.frames, 32);
        assert_eq!(shown.labels, vec!["normal", "harassment"]);
        assert!(shown.finished);
        assert!(h.calls.lock().unwrap().iter().all(|b| b.len() == 16));
        assert!(*h.closed.lock().unwrap());
    }

    #[test]
    fn test_frames_carry_latest_published_label() {
        let (classifier, _) = RecordingClassifier::new(&["first", "second"]);
        let recorder = LabelRecorder::default();
        let settings = PipelineSettings {
            target_fps: 1000.0,
            ..Default::default()
        };
        let analyzer = FrameAnalyzer::new(
            Box::new(PairEverywhere(pair_at(320, 240))),
            Box::new(recorder.clone()),
            &settings,
        );
        let mut use_case = LiveStreamUseCase::new(
            Box::new(FakeCamera {
                limit: Some(32),
                fail_open: false,
                closed: Arc::new(Mutex::new(false)),
            }),
            analyzer,
            Box::new(classifier),
            Box::new(RecordingSink(Arc::new(Mutex::new(Shown::default())))),
            Box::new(NullPipelineLogger),
            settings,
            None,
            None,
        );
        use_case.open_camera(Path::new("/dev/video0"));
        use_case.run(StreamLimits::default()).unwrap();

        let drawn = recorder.recorded();
        assert_eq!(drawn.len(), 32);
        // Nothing can be published before the first clip is complete.
        assert!(drawn[..15].iter().all(|(_, label)| label.is_none()));
        // Once a label appears it is only ever replaced by a newer one.
        let rank = |label: &Option<String>| match label.as_deref() {
            None => 0,
            Some("first") => 1,
            Some("second") => 2,
            Some(other) => panic!("unexpected label {other}"),
        };
        let ranks: Vec<u8> = drawn.iter().map(|(_, label)| rank(label)).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "{ranks:?}");
        assert_eq!(use_case.prediction().get().as_deref(), Some("second"));
    }

    #[test]
    fn test_partial_batch_discarded_at_shutdown() {
        let (classifier, calls) = RecordingClassifier::new(&["normal"]);
        let mut h = harness(None, false, classifier, calls);
        h.use_case.open_camera(Path::new("/dev/video0"));

        let report = h
            .use_case
            .run(StreamLimits {
                max_frames: Some(20),
                duration: None,
            })
            .unwrap();

        assert_eq!(report.frames_captured, 20);
        assert_eq!(report.batches_submitted, 1);
        assert_eq!(report.crops_discarded, 4);
        assert_eq!(h.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancelled_before_start_captures_nothing() {
        let (classifier, calls) = RecordingClassifier::new(&["normal"]);
        let mut h = harness(None, false, classifier, calls);
        h.use_case.open_camera(Path::new("/dev/video0"));
        h.use_case.cancel_token().store(true, Ordering::Relaxed);

        let report = h.use_case.run(StreamLimits::default()).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.frames_captured, 0);
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_duration_stops_immediately() {
        let (classifier, calls) = RecordingClassifier::new(&["normal"]);
        let mut h = harness(None, false, classifier, calls);
        h.use_case.open_camera(Path::new("/dev/video0"));

        let report = h
            .use_case
            .run(StreamLimits {
                max_frames: None,
                duration: Some(Duration::ZERO),
            })
            .unwrap();
        assert_eq!(report.frames_captured, 0);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_classifier_errors_are_ignored_by_default() {
        let (mut classifier, calls) = RecordingClassifier::new(&["normal"]);
        classifier.fail_on = Some(0);
        let mut h = harness(Some(32), false, classifier, calls);
        h.use_case.open_camera(Path::new("/dev/video0"));

        let report = h.use_case.run(StreamLimits::default()).unwrap();
        assert_eq!(report.worker.failed, 1);
        assert_eq!(report.worker.classified, 1);
        assert_eq!(report.last_prediction.as_deref(), Some("normal"));
    }

    #[test]
    fn test_run_twice_fails_and_shutdown_is_idempotent() {
        let (classifier, calls) = RecordingClassifier::new(&["normal"]);
        let mut h = harness(Some(2), false, classifier, calls);
        h.use_case.open_camera(Path::new("/dev/video0"));
        h.use_case.run(StreamLimits::default()).unwrap();

        assert!(h.use_case.run(StreamLimits::default()).is_err());
        assert_eq!(h.use_case.shutdown(), WorkerStats::default());
    }
}
