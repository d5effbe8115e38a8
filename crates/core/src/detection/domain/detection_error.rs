use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by an [`ObjectDetector`](super::object_detector::ObjectDetector).
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("frame has zero area ({width}x{height})")]
    InvalidFrame { width: u32, height: u32 },
    #[error("confidence threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
    #[error("invalid label table: {0}")]
    Labels(String),
}
