use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use vigil_core::annotation::domain::frame_annotator::FrameAnnotator;
use vigil_core::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use vigil_core::classification::domain::action_classifier::ActionClassifier;
use vigil_core::classification::infrastructure::onnx_videomae_classifier::OnnxVideoMaeClassifier;
use vigil_core::detection::infrastructure::bytetrack_tracker::ByteTracker;
use vigil_core::detection::infrastructure::onnx_yolo_person_detector::OnnxYoloPersonDetector;
use vigil_core::pipeline::classify_video_use_case::ClassifyVideoUseCase;
use vigil_core::pipeline::display_sink::{DisplaySink, LogSink};
use vigil_core::pipeline::frame_analyzer::FrameAnalyzer;
use vigil_core::pipeline::infrastructure::video_file_sink::VideoFileSink;
use vigil_core::pipeline::live_stream_use_case::{LiveStreamUseCase, StreamLimits};
use vigil_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use vigil_core::shared::constants::{
    CLASSIFIER_MODEL_DIR, DETECTOR_MODEL_NAME, TRACKER_MAX_LOST, VIDEO_EXTENSIONS,
};
use vigil_core::shared::model_resolver::ModelLocator;
use vigil_core::shared::settings::PipelineSettings;
use vigil_core::video::infrastructure::ffmpeg_camera_reader::{
    default_backend, default_device, CameraConfig, FfmpegCameraReader,
};
use vigil_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use vigil_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

/// Attention-region action classification for videos and camera feeds.
#[derive(Parser)]
#[command(name = "vigil")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a recorded video.
    Analyze {
        /// Input video file.
        input: PathBuf,

        /// Write the annotated video here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Classify a live camera feed.
    Watch {
        /// Capture device (defaults to the platform's first camera).
        #[arg(long)]
        device: Option<String>,

        /// libavdevice input format (v4l2, avfoundation, dshow).
        #[arg(long)]
        backend: Option<String>,

        /// Stop after this many frames.
        #[arg(long)]
        max_frames: Option<usize>,

        /// Stop after this many seconds.
        #[arg(long)]
        duration: Option<f64>,

        /// Record the annotated feed here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON settings file; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working frame width; frames are resized to this before detection.
    #[arg(long, global = true)]
    frame_width: Option<u32>,

    /// Working frame height.
    #[arg(long, global = true)]
    frame_height: Option<u32>,

    /// Analysis rate for files, capture rate for cameras.
    #[arg(long, global = true)]
    target_fps: Option<f64>,

    /// Side of the square attention window in pixels.
    #[arg(long, global = true)]
    attention_size: Option<u32>,

    /// Crops per classification clip.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Max centroid distance for two people to be grouped.
    #[arg(long, global = true)]
    group_distance: Option<f64>,

    /// Max subject movement between frames before a switch is rejected.
    #[arg(long, global = true)]
    displacement_threshold: Option<f64>,

    /// Groups larger than this are cut to their first members.
    #[arg(long, global = true)]
    max_group_size: Option<usize>,

    /// Person detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f32>,

    /// Person detector ONNX file (resolved from the model cache if omitted).
    #[arg(long, global = true)]
    detector_model: Option<PathBuf>,

    /// Download URL for the detector when it is not cached.
    #[arg(long, global = true)]
    detector_url: Option<String>,

    /// Directory holding the classifier's model.onnx and config.json.
    #[arg(long, global = true)]
    classifier_dir: Option<PathBuf>,

    /// Directory searched for models after the cache.
    #[arg(long, global = true, default_value = "models")]
    models_dir: PathBuf,

    /// TTF/OTF font for drawing the prediction on frames.
    #[arg(long, global = true)]
    font: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli.common)?;

    match cli.command {
        Command::Analyze { input, output } => {
            run_analyze(&cli.common, settings, &input, output.as_deref())
        }
        Command::Watch {
            device,
            backend,
            max_frames,
            duration,
            output,
        } => {
            let limits = StreamLimits {
                max_frames,
                duration: duration.map(parse_duration).transpose()?,
            };
            run_watch(
                &cli.common,
                settings,
                device.as_deref().unwrap_or(default_device()),
                backend.as_deref().unwrap_or(default_backend()),
                limits,
                output.as_deref(),
            )
        }
    }
}

fn run_analyze(
    common: &CommonArgs,
    settings: PipelineSettings,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    validate_input(input)?;
    let analyzer = build_analyzer(common, &settings)?;
    let classifier = build_classifier(common)?;

    let mut use_case = ClassifyVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        analyzer,
        classifier,
        build_sink(output),
        Box::new(StdoutPipelineLogger::new(30)),
        settings,
        None,
        None,
    );
    let report = use_case.execute(input)?;

    log::info!(
        "Analyzed {}/{} frames (every {}), {} clip(s) classified",
        report.frames_analyzed,
        report.frames_read,
        report.sample_interval,
        report.predictions.len()
    );
    match report.final_prediction() {
        Some(label) => println!("{label}"),
        None => println!("no prediction (fewer than two people found together)"),
    }
    if let Some(path) = output {
        log::info!("Output written to {}", path.display());
    }
    Ok(())
}

fn run_watch(
    common: &CommonArgs,
    settings: PipelineSettings,
    device: &str,
    backend: &str,
    limits: StreamLimits,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let analyzer = build_analyzer(common, &settings)?;
    let classifier = build_classifier(common)?;
    let camera = FfmpegCameraReader::new(
        CameraConfig::new(settings.frame_width, settings.frame_height, settings.target_fps)
            .with_backend(backend),
    );

    let mut use_case = LiveStreamUseCase::new(
        Box::new(camera),
        analyzer,
        classifier,
        build_sink(output),
        Box::new(StdoutPipelineLogger::new(30)),
        settings,
        None,
        None,
    );
    if !use_case.open_camera(Path::new(device)) {
        return Err(format!("Could not open camera {device}").into());
    }

    let report = use_case.run(limits)?;
    log::info!(
        "Captured {} frames, {} clip(s) classified, {} failed",
        report.frames_captured,
        report.worker.classified,
        report.worker.failed
    );
    if let Some(label) = report.last_prediction {
        println!("{label}");
    }
    Ok(())
}

fn load_settings(common: &CommonArgs) -> Result<PipelineSettings, Box<dyn std::error::Error>> {
    let mut settings = match &common.config {
        Some(path) => PipelineSettings::load(path)?,
        None => PipelineSettings::default(),
    };
    if let Some(width) = common.frame_width {
        settings.frame_width = width;
    }
    if let Some(height) = common.frame_height {
        settings.frame_height = height;
    }
    if let Some(fps) = common.target_fps {
        settings.target_fps = fps;
    }
    if let Some(size) = common.attention_size {
        settings.attention_size = size;
    }
    if let Some(size) = common.batch_size {
        settings.batch_size = size;
    }
    if let Some(distance) = common.group_distance {
        settings.group_distance_threshold = distance;
    }
    if let Some(threshold) = common.displacement_threshold {
        settings.displacement_threshold = threshold;
    }
    if let Some(size) = common.max_group_size {
        settings.max_group_size = size;
    }
    if let Some(confidence) = common.confidence {
        settings.detection_confidence = confidence;
    }
    settings.validate()?;
    Ok(settings)
}

fn build_analyzer(
    common: &CommonArgs,
    settings: &PipelineSettings,
) -> Result<FrameAnalyzer, Box<dyn std::error::Error>> {
    let model_path = match &common.detector_model {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
            let path = locator(common)?.resolve(
                DETECTOR_MODEL_NAME,
                common.detector_url.as_deref(),
                Some(Box::new(download_progress)),
            )?;
            eprintln!();
            path
        }
    };
    let detector = OnnxYoloPersonDetector::new(
        &model_path,
        ByteTracker::new(TRACKER_MAX_LOST),
        settings.detection_confidence,
    )?;

    let annotator: Box<dyn FrameAnnotator> = match &common.font {
        Some(font) => Box::new(OverlayAnnotator::with_font_file(font)?),
        None => {
            log::info!("No --font given; predictions are logged but not drawn");
            Box::new(OverlayAnnotator::new(None))
        }
    };

    Ok(FrameAnalyzer::new(Box::new(detector), annotator, settings))
}

fn build_classifier(
    common: &CommonArgs,
) -> Result<Box<dyn ActionClassifier>, Box<dyn std::error::Error>> {
    let dir = match &common.classifier_dir {
        Some(dir) => dir.clone(),
        None => locator(common)?.resolve(CLASSIFIER_MODEL_DIR, None, None)?,
    };
    Ok(Box::new(OnnxVideoMaeClassifier::from_dir(&dir)?))
}

fn build_sink(output: Option<&Path>) -> Box<dyn DisplaySink> {
    match output {
        Some(path) => Box::new(VideoFileSink::new(Box::new(FfmpegWriter::new()), path)),
        None => Box::new(LogSink::new()),
    }
}

fn locator(common: &CommonArgs) -> Result<ModelLocator, Box<dyn std::error::Error>> {
    Ok(ModelLocator::with_default_cache(Some(common.models_dir.clone()))?)
}

fn validate_input(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }
    let known = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
    if !known {
        log::warn!(
            "{} does not have a known video extension ({}); trying anyway",
            input.display(),
            VIDEO_EXTENSIONS.join(", ")
        );
    }
    Ok(())
}

fn parse_duration(seconds: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !(seconds.is_finite() && seconds >= 0.0) {
        return Err(
            format!("Duration must be a non-negative number of seconds, got {seconds}").into(),
        );
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading person detection model... {pct}%");
    } else {
        eprint!("\rDownloading person detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from(args: &[&str]) -> Result<PipelineSettings, Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from(args)?;
        load_settings(&cli.common)
    }

    #[test]
    fn test_every_tunable_has_a_flag() {
        let settings = settings_from(&[
            "vigil",
            "analyze",
            "clip.mp4",
            "--frame-width",
            "800",
            "--frame-height",
            "600",
            "--target-fps",
            "15",
            "--attention-size",
            "256",
            "--batch-size",
            "8",
            "--group-distance",
            "90",
            "--displacement-threshold",
            "30",
            "--max-group-size",
            "3",
            "--confidence",
            "0.4",
        ])
        .unwrap();

        assert_eq!(
            settings,
            PipelineSettings {
                frame_width: 800,
                frame_height: 600,
                target_fps: 15.0,
                attention_size: 256,
                batch_size: 8,
                group_distance_threshold: 90.0,
                displacement_threshold: 30.0,
                max_group_size: 3,
                detection_confidence: 0.4,
            }
        );
    }

    #[test]
    fn test_no_flags_gives_defaults() {
        let settings = settings_from(&["vigil", "watch"]).unwrap();
        assert_eq!(settings, PipelineSettings::default());
    }

    #[test]
    fn test_overrides_are_validated() {
        assert!(settings_from(&["vigil", "watch", "--max-group-size", "1"]).is_err());
        assert!(settings_from(&["vigil", "watch", "--frame-width", "0"]).is_err());
    }
}
