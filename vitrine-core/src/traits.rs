//! Collaborator seams of the pipeline

use crate::error::{ComputeError, FetchError};
use crate::types::{Detection, Embedding, Frame};
use async_trait::async_trait;
use image::RgbImage;

/// Produces the ordered frames behind a media URL.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn fetch_frames(&self, url: &str) -> Result<Vec<Frame>, FetchError>;
}

/// Finds product objects in one frame.
///
/// A frame that cannot be decoded yields `Ok(vec![])`; only model failures are errors.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ComputeError>;
}

/// Maps an image crop to a unit-norm vector of fixed dimension.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, image: &RgbImage) -> Result<Embedding, ComputeError>;
}
