mod ffmpeg_decode;
pub mod ffmpeg_camera_reader;
pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
