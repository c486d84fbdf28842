//! CLIP image encoder for product embeddings

use crate::error::VisionError;
use crate::utils::{resize_shortest_center_crop, rgb_to_chw_tensor, CLIP_MEAN, CLIP_STD};
use image::RgbImage;

/// CLIP standard input size
pub const CLIP_INPUT_SIZE: u32 = 224;

/// CLIP ViT-B/32 embedding dimension
pub const CLIP_EMBEDDING_DIM: usize = 512;

/// Build the `[3, 224, 224]` CLIP input for one crop.
pub fn preprocess(image: &RgbImage) -> Result<Vec<f32>, VisionError> {
    let square = resize_shortest_center_crop(image, CLIP_INPUT_SIZE)?;
    rgb_to_chw_tensor(&square, CLIP_MEAN, CLIP_STD)
}

/// Pull the single feature row out of a `[1, D]` (or `[D]`) output.
pub fn extract_features(shape: &[i64], data: &[f32]) -> Result<Vec<f32>, VisionError> {
    let dim = match shape {
        [d] => *d,
        [1, d] => *d,
        _ => {
            return Err(VisionError::Model(format!(
                "Unexpected CLIP output shape: {:?}",
                shape
            )))
        }
    };

    // Validate embedding dimension is reasonable
    const MAX_EMBEDDING_DIM: i64 = 10_000;
    if dim <= 0 || dim > MAX_EMBEDDING_DIM || data.len() != dim as usize {
        return Err(VisionError::Model(format!(
            "Invalid CLIP embedding dimension {} ({} values)",
            dim,
            data.len()
        )));
    }

    Ok(data.to_vec())
}

#[cfg(feature = "onnx")]
pub use self::session::ClipModel;

#[cfg(feature = "onnx")]
mod session {
    use super::{extract_features, preprocess, CLIP_INPUT_SIZE};
    use crate::embedder::FeatureModel;
    use crate::error::VisionError;
    use image::RgbImage;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use std::path::Path;
    use tracing::info;

    /// CLIP visual tower
    pub struct ClipModel {
        session: Mutex<Session>,
    }

    impl ClipModel {
        /// Load a CLIP image-encoder ONNX export
        pub fn new(model_path: &Path, intra_threads: usize) -> Result<Self, VisionError> {
            let builder = Session::builder()
                .map_err(|e| VisionError::Ort(format!("Failed to create session builder: {}", e)))?;
            let builder = builder
                .with_intra_threads(intra_threads)
                .map_err(|e| VisionError::Ort(format!("Failed to set intra threads: {}", e)))?;
            let session = builder
                .commit_from_file(model_path)
                .map_err(|e| VisionError::Ort(format!("Failed to load CLIP model: {}", e)))?;

            info!("CLIP model loaded from {:?}", model_path);

            Ok(Self {
                session: Mutex::new(session),
            })
        }
    }

    impl FeatureModel for ClipModel {
        fn features(&self, image: &RgbImage) -> Result<Vec<f32>, VisionError> {
            let side = CLIP_INPUT_SIZE as usize;
            let data = preprocess(image)?;
            let input = Tensor::from_array(([1usize, 3, side, side], data))
                .map_err(|e| VisionError::Ort(format!("Failed to create input tensor: {}", e)))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(|e| VisionError::Ort(format!("CLIP inference failed: {}", e)))?;
            let (shape, raw) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| VisionError::Ort(format!("Failed to extract output tensor: {}", e)))?;

            let dims: Vec<i64> = shape.iter().copied().collect();
            let features = extract_features(&dims, raw)?;
            Ok(features)
        }
    }
}
