// Pipeline records: frames, detections, embeddings, catalog entries, matches

use crate::error::ComputeError;
use bytes::Bytes;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Embedding width of CLIP ViT-B/32.
pub const DEFAULT_EMBEDDING_DIM: usize = 512;

/// Allowed deviation of an embedding's L2 norm from 1.
pub const NORM_TOLERANCE: f32 = 1e-5;

/// Pixel payload of a frame.
#[derive(Debug, Clone)]
pub enum FrameData {
    Decoded(RgbImage),
    /// Image file bytes (JPEG, PNG, ...) not decoded yet.
    Encoded(Bytes),
}

/// One still image taken from source media.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub data: FrameData,
}

impl Frame {
    pub fn decoded(index: usize, image: RgbImage) -> Self {
        Self {
            index,
            data: FrameData::Decoded(image),
        }
    }

    pub fn encoded(index: usize, bytes: impl Into<Bytes>) -> Self {
        Self {
            index,
            data: FrameData::Encoded(bytes.into()),
        }
    }

    /// Decode into an RGB raster, borrowing when already decoded.
    pub fn decode(&self) -> Result<Cow<'_, RgbImage>, ComputeError> {
        let image = match &self.data {
            FrameData::Decoded(image) => Cow::Borrowed(image),
            FrameData::Encoded(bytes) => {
                let decoded = image::load_from_memory(bytes)
                    .map_err(|e| ComputeError::InvalidImage(format!("frame {}: {}", self.index, e)))?;
                Cow::Owned(decoded.to_rgb8())
            }
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(ComputeError::InvalidImage(format!(
                "frame {} has zero size",
                self.index
            )));
        }
        Ok(image)
    }
}

/// Integer pixel box, `x1 < x2` and `y1 < y2`, max corner exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Clamp a float `[x_min, y_min, x_max, y_max]` box to a `width` x
    /// `height` frame and truncate every coordinate to a whole pixel. Returns
    /// `None` when nothing of the box is left.
    pub fn from_xyxy(bbox: [f32; 4], width: u32, height: u32) -> Option<Self> {
        if bbox.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let clamp = |v: f32, max: u32| v.max(0.0).min(max as f32) as u32;
        let x1 = clamp(bbox[0], width);
        let y1 = clamp(bbox[1], height);
        let x2 = clamp(bbox[2], width);
        let y2 = clamp(bbox[3], height);

        Self::new(x1, y1, x2, y2)
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// A category-filtered object found in one frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub category: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub frame_index: usize,
    pub cropped_image: RgbImage,
}

/// Unit-norm feature vector. Only constructible through normalization or a
/// norm check, so every value satisfies `|‖v‖₂ - 1| < NORM_TOLERANCE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// L2-normalize a raw model output.
    pub fn from_raw(mut raw: Vec<f32>) -> Result<Self, ComputeError> {
        if raw.is_empty() {
            return Err(ComputeError::DegenerateEmbedding("empty vector".to_string()));
        }
        if raw.iter().any(|v| !v.is_finite()) {
            return Err(ComputeError::DegenerateEmbedding(
                "vector contains non-finite values".to_string(),
            ));
        }

        let norm = crate::math::l2_norm(&raw);
        if norm == 0.0 || !norm.is_finite() {
            return Err(ComputeError::DegenerateEmbedding(format!(
                "cannot normalize vector with norm {}",
                norm
            )));
        }

        for v in raw.iter_mut() {
            *v = (*v as f64 / norm) as f32;
        }
        Ok(Self(raw))
    }

    /// Accept an already-normalized vector, rejecting it if the norm is off.
    pub fn from_unit(vector: Vec<f32>) -> Result<Self, ComputeError> {
        if vector.is_empty() {
            return Err(ComputeError::DegenerateEmbedding("empty vector".to_string()));
        }
        let norm = crate::math::l2_norm(&vector);
        if !norm.is_finite() || (norm - 1.0).abs() >= NORM_TOLERANCE as f64 {
            return Err(ComputeError::DegenerateEmbedding(format!(
                "expected unit norm, got {}",
                norm
            )));
        }
        Ok(Self(vector))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Inner product, equal to cosine similarity for unit vectors.
    pub fn dot(&self, other: &Embedding) -> f32 {
        crate::math::dot(&self.0, &other.0)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// A product known to the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub product_id: u64,
    pub name: String,
    pub image_url: String,
    pub embedding: Embedding,
}

/// A catalog entry returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u64>,
    pub name: String,
    pub image_url: String,
    pub similarity_score: f32,
}

/// One detected object and the products that look like it.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub object_category: String,
    pub confidence: f32,
    pub bounding_box: Option<BoundingBox>,
    pub frame_index: Option<usize>,
    pub cropped_image: Option<RgbImage>,
    pub matches: Vec<Match>,
}

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub url: String,
    #[serde(default)]
    pub test_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_embedding_from_raw_normalizes() {
        let embedding = Embedding::from_raw(vec![3.0, 4.0]).unwrap();
        assert!((embedding.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((embedding.as_slice()[1] - 0.8).abs() < 1e-6);
        assert!((norm(embedding.as_slice()) - 1.0).abs() < NORM_TOLERANCE);
    }

    #[test]
    fn test_embedding_zero_norm_is_error() {
        let result = Embedding::from_raw(vec![0.0; 512]);
        assert!(matches!(result, Err(ComputeError::DegenerateEmbedding(_))));
    }

    #[test]
    fn test_embedding_rejects_nan() {
        assert!(Embedding::from_raw(vec![1.0, f32::NAN]).is_err());
        assert!(Embedding::from_raw(vec![]).is_err());
    }

    #[test]
    fn test_embedding_from_unit_checks_norm() {
        assert!(Embedding::from_unit(vec![1.0, 0.0, 0.0]).is_ok());
        assert!(Embedding::from_unit(vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_embedding_dot() {
        let a = Embedding::from_raw(vec![1.0, 0.0]).unwrap();
        let b = Embedding::from_raw(vec![1.0, 1.0]).unwrap();
        assert!((a.dot(&b) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((a.dot(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_truncates_and_clamps() {
        let bbox = BoundingBox::from_xyxy([10.4, 20.6, 30.2, 40.9], 100, 100).unwrap();
        assert_eq!(bbox, BoundingBox { x1: 10, y1: 20, x2: 30, y2: 40 });

        let bbox = BoundingBox::from_xyxy([10.7, 10.7, 30.3, 30.3], 100, 100).unwrap();
        assert_eq!(bbox, BoundingBox { x1: 10, y1: 10, x2: 30, y2: 30 });

        let bbox = BoundingBox::from_xyxy([-5.0, -5.0, 150.0, 80.0], 100, 60).unwrap();
        assert_eq!(bbox, BoundingBox { x1: 0, y1: 0, x2: 100, y2: 60 });
        assert_eq!(bbox.area(), 6000);
    }

    #[test]
    fn test_bounding_box_outside_frame_is_none() {
        assert!(BoundingBox::from_xyxy([120.0, 10.0, 140.0, 20.0], 100, 100).is_none());
        assert!(BoundingBox::from_xyxy([10.0, 10.0, 10.0, 20.0], 100, 100).is_none());
        // Sub-pixel width truncates to nothing
        assert!(BoundingBox::from_xyxy([10.2, 10.0, 10.9, 20.0], 100, 100).is_none());
        assert!(BoundingBox::from_xyxy([f32::NAN, 0.0, 1.0, 1.0], 100, 100).is_none());
    }

    #[test]
    fn test_frame_decode_encoded_png() {
        let image = RgbImage::from_pixel(4, 3, image::Rgb([10, 20, 30]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();

        let frame = Frame::encoded(7, bytes);
        let decoded = frame.decode().unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_frame_decode_garbage_fails() {
        let frame = Frame::encoded(0, vec![0u8, 1, 2, 3]);
        assert!(matches!(frame.decode(), Err(ComputeError::InvalidImage(_))));
    }

    #[test]
    fn test_process_request_test_mode_defaults_false() {
        let request: ProcessRequest =
            serde_json::from_str(r#"{"url": "https://www.instagram.com/p/abc/"}"#).unwrap();
        assert!(!request.test_mode);
    }
}
