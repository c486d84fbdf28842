// Shared stubs for pipeline and API tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::sync::Arc;
use vitrine_core::{
    BoundingBox, ComputeError, Detection, Embedder, Embedding, FetchError, Frame, FrameSource,
    ObjectDetector, ProcessRequest,
};
use vitrine_index::{demo_catalog, SimilarityIndex};
use vitrine_server::{Pipeline, PipelineSettings};

pub const DIM: usize = 8;
pub const REEL_URL: &str = "https://www.instagram.com/reel/ABC123/";

/// Returns `frames` solid 16x16 frames.
pub struct StaticSource {
    pub frames: usize,
}

#[async_trait]
impl FrameSource for StaticSource {
    async fn fetch_frames(&self, _url: &str) -> Result<Vec<Frame>, FetchError> {
        Ok((0..self.frames)
            .map(|i| Frame::decoded(i, RgbImage::from_pixel(16, 16, Rgb([i as u8 * 10, 0, 0]))))
            .collect())
    }
}

pub struct FailingSource;

#[async_trait]
impl FrameSource for FailingSource {
    async fn fetch_frames(&self, _url: &str) -> Result<Vec<Frame>, FetchError> {
        Err(FetchError::Network("connection refused by 10.1.2.3".to_string()))
    }
}

pub struct PanickingSource;

#[async_trait]
impl FrameSource for PanickingSource {
    async fn fetch_frames(&self, _url: &str) -> Result<Vec<Frame>, FetchError> {
        panic!("frame source bug")
    }
}

/// Emits the scripted `(category, confidence)` list for each frame index.
pub struct ScriptedDetector {
    pub per_frame: Vec<Vec<(&'static str, f32)>>,
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, ComputeError> {
        let script = self.per_frame.get(frame.index).cloned().unwrap_or_default();
        Ok(script
            .into_iter()
            .enumerate()
            .map(|(i, (category, confidence))| {
                let shade = (frame.index * 40 + i * 10) as u8;
                Detection {
                    category: category.to_string(),
                    confidence,
                    bounding_box: BoundingBox::new(0, 0, 8, 8).unwrap(),
                    frame_index: frame.index,
                    cropped_image: RgbImage::from_pixel(8, 8, Rgb([shade, 100, 200])),
                }
            })
            .collect())
    }
}

pub struct FailingDetector;

impl ObjectDetector for FailingDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ComputeError> {
        Err(ComputeError::Model("session poisoned".to_string()))
    }
}

pub struct PanickingDetector;

impl ObjectDetector for PanickingDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, ComputeError> {
        panic!("detector bug")
    }
}

/// Deterministic embedding from the crop's first pixel.
pub struct PixelEmbedder;

impl Embedder for PixelEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, image: &RgbImage) -> Result<Embedding, ComputeError> {
        let [r, g, b] = image.get_pixel(0, 0).0;
        let raw = (0..DIM)
            .map(|i| match i % 3 {
                0 => r as f32 + i as f32,
                1 => g as f32 - i as f32,
                _ => b as f32 * 0.5,
            })
            .collect();
        Embedding::from_raw(raw)
    }
}

/// Always produces the zero vector, which cannot be normalized.
pub struct ZeroEmbedder;

impl Embedder for ZeroEmbedder {
    fn dimension(&self) -> usize {
        DIM
    }

    fn embed(&self, _image: &RgbImage) -> Result<Embedding, ComputeError> {
        Embedding::from_raw(vec![0.0; DIM])
    }
}

pub fn demo_index() -> Arc<SimilarityIndex> {
    Arc::new(SimilarityIndex::build(demo_catalog(DIM).unwrap(), DIM).unwrap())
}

pub fn pipeline_with(
    source: Arc<dyn FrameSource>,
    detector: Arc<dyn ObjectDetector>,
    embedder: Arc<dyn Embedder>,
) -> Pipeline {
    Pipeline::new(source, detector, embedder, demo_index(), PipelineSettings::default()).unwrap()
}

/// Three frames: a chair, nothing, then a vase and a cup.
pub fn scripted_pipeline() -> Pipeline {
    pipeline_with(
        Arc::new(StaticSource { frames: 3 }),
        Arc::new(ScriptedDetector {
            per_frame: vec![
                vec![("chair", 0.9)],
                vec![],
                vec![("vase", 0.7), ("cup", 0.6)],
            ],
        }),
        Arc::new(PixelEmbedder),
    )
}

pub fn reel_request(test_mode: bool) -> ProcessRequest {
    ProcessRequest {
        url: REEL_URL.to_string(),
        test_mode,
    }
}
