/// Default person detector weights (YOLOv8 COCO export).
pub const DETECTOR_MODEL_NAME: &str = "yolov8n.onnx";

/// Default action classifier directory: `model.onnx` plus the Hugging Face
/// `config.json` carrying `id2label`.
pub const CLASSIFIER_MODEL_DIR: &str = "VideoMAE";
pub const CLASSIFIER_MODEL_FILE: &str = "model.onnx";
pub const CLASSIFIER_CONFIG_FILE: &str = "config.json";

/// Side of the square attention window, in resized-frame pixels.
pub const DEFAULT_ATTENTION_SIZE: u32 = 320;

/// Crops per classification clip.
pub const DEFAULT_BATCH_SIZE: usize = 16;

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Max centroid distance for two people to join the same group.
pub const DEFAULT_GROUP_DISTANCE: f64 = 120.0;

/// Max centroid jump between frames before a new selection is rejected.
pub const DEFAULT_DISPLACEMENT_THRESHOLD: f64 = 20.0;

/// Groups larger than this are truncated to their earliest members.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 4;

pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;

/// Max frames a track can be lost before removal (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov"];
