pub mod classification_worker;
pub mod video_file_sink;
