pub mod ffmpeg_capture_source;
pub mod threaded_frame_source;
