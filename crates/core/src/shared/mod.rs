pub mod constants;
pub mod crop_window;
pub mod detection;
pub mod frame;
pub mod model_resolver;
pub mod settings;
pub mod video_metadata;
