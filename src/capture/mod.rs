//! Capture engine implementations
//!
//! Concrete encoders the recorder can drive. The recorder itself only knows
//! the `CaptureEngine` trait.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegCaptureEngine, DEFAULT_READ_BUFFER_SIZE};
