pub mod ffmpeg;
pub mod fs;
pub mod logger;
