pub mod classify_error_policy;
pub mod classify_video_use_case;
pub mod display_sink;
pub mod frame_analyzer;
pub mod infrastructure;
pub mod live_stream_use_case;
pub mod pipeline_logger;
pub mod prediction_cell;
