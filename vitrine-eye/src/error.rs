//! Error types for vitrine-eye

use thiserror::Error;
use vitrine_core::{ComputeError, FetchError};

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),
}

impl From<VisionError> for ComputeError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Image(e) => ComputeError::InvalidImage(e.to_string()),
            other => ComputeError::Model(other.to_string()),
        }
    }
}

impl From<VisionError> for FetchError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Io(e) => FetchError::Io(e),
            VisionError::Network(e) => FetchError::Network(e.to_string()),
            VisionError::Image(e) => FetchError::Decode(e.to_string()),
            other => FetchError::UnsupportedMedia(other.to_string()),
        }
    }
}
