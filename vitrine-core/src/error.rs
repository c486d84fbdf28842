use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures while turning pixels into numbers: model inference, degenerate
/// embeddings, unusable crops.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    #[error("Degenerate embedding: {0}")]
    DegenerateEmbedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Model error: {0}")]
    Model(String),
}

/// Failures of a frame source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Media decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Discriminant visible to callers of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    NoMedia,
    NoObjectsFound,
    FetchFailure,
    ComputeError,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::NoMedia => "NoMedia",
            ErrorKind::NoObjectsFound => "NoObjectsFound",
            ErrorKind::FetchFailure => "FetchFailure",
            ErrorKind::ComputeError => "ComputeError",
            ErrorKind::Internal => "Internal",
        }
    }

    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NoMedia | ErrorKind::NoObjectsFound => 404,
            ErrorKind::FetchFailure => 503,
            ErrorKind::ComputeError | ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No media found at this URL")]
    NoMedia,

    #[error("No products detected in the media")]
    NoObjectsFound,

    #[error("Failed to fetch media: {0}")]
    FetchFailure(#[from] FetchError),

    #[error("Compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput(_) => ErrorKind::InvalidInput,
            PipelineError::NoMedia => ErrorKind::NoMedia,
            PipelineError::NoObjectsFound => ErrorKind::NoObjectsFound,
            PipelineError::FetchFailure(_) => ErrorKind::FetchFailure,
            PipelineError::Compute(_) => ErrorKind::ComputeError,
            PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message safe to hand to an external caller. Fetch, compute and internal
    /// causes stay in the logs.
    pub fn public_detail(&self) -> String {
        match self {
            PipelineError::InvalidInput(msg) => msg.clone(),
            PipelineError::NoMedia => "No media found at this URL".to_string(),
            PipelineError::NoObjectsFound => "No products detected in the media".to_string(),
            PipelineError::FetchFailure(_) => {
                "Failed to download media. Please check the URL.".to_string()
            }
            PipelineError::Compute(_) => "Processing error".to_string(),
            PipelineError::Internal(_) => "Internal processing error".to_string(),
        }
    }
}
