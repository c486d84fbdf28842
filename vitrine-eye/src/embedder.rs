//! Visual embedder: raw image features, dimension-checked and L2-normalized

use crate::error::VisionError;
use image::RgbImage;
use std::sync::Arc;
use tracing::debug;
use vitrine_core::{ComputeError, Embedder, Embedding};

/// A network that maps an image to an unnormalized feature vector.
#[cfg_attr(test, mockall::automock)]
pub trait FeatureModel: Send + Sync {
    fn features(&self, image: &RgbImage) -> Result<Vec<f32>, VisionError>;
}

pub struct VisualEmbedder {
    model: Arc<dyn FeatureModel>,
    dimension: usize,
}

impl VisualEmbedder {
    pub fn new(model: Arc<dyn FeatureModel>, dimension: usize) -> Self {
        Self { model, dimension }
    }
}

impl Embedder for VisualEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, image: &RgbImage) -> Result<Embedding, ComputeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ComputeError::InvalidImage("cannot embed an empty crop".to_string()));
        }

        let raw = self.model.features(image)?;
        if raw.len() != self.dimension {
            return Err(ComputeError::DimensionMismatch {
                expected: self.dimension,
                actual: raw.len(),
            });
        }

        let embedding = Embedding::from_raw(raw)?;
        debug!("Embedded {}x{} crop", image.width(), image.height());
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use vitrine_core::NORM_TOLERANCE;

    fn embedder_returning(raw: Vec<f32>, dimension: usize) -> VisualEmbedder {
        let mut model = MockFeatureModel::new();
        model.expect_features().returning(move |_| Ok(raw.clone()));
        VisualEmbedder::new(Arc::new(model), dimension)
    }

    fn crop() -> RgbImage {
        RgbImage::from_pixel(16, 9, Rgb([40, 50, 60]))
    }

    #[test]
    fn test_embed_is_unit_norm() {
        let raw: Vec<f32> = (0..512).map(|i| (i as f32 * 0.37).sin() * 10.0).collect();
        let embedder = embedder_returning(raw, 512);

        let embedding = embedder.embed(&crop()).unwrap();
        assert_eq!(embedding.dimension(), 512);
        let norm: f32 = embedding.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < NORM_TOLERANCE);
    }

    #[test]
    fn test_embed_zero_vector_is_compute_error() {
        let embedder = embedder_returning(vec![0.0; 8], 8);
        assert!(matches!(
            embedder.embed(&crop()),
            Err(ComputeError::DegenerateEmbedding(_))
        ));
    }

    #[test]
    fn test_embed_wrong_dimension() {
        let embedder = embedder_returning(vec![1.0; 4], 8);
        assert_eq!(
            embedder.embed(&crop()).unwrap_err(),
            ComputeError::DimensionMismatch { expected: 8, actual: 4 }
        );
    }

    #[test]
    fn test_embed_single_pixel_crop() {
        let embedder = embedder_returning(vec![2.0, 0.0], 2);
        let pixel = RgbImage::from_pixel(1, 1, Rgb([0, 0, 0]));
        assert_eq!(embedder.embed(&pixel).unwrap().as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_embed_empty_crop_rejected() {
        let mut model = MockFeatureModel::new();
        model.expect_features().never();
        let embedder = VisualEmbedder::new(Arc::new(model), 2);
        assert!(embedder.embed(&RgbImage::new(0, 0)).is_err());
    }
}
