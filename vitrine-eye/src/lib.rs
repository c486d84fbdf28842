//! vitrine-eye: the vision side of vitrine
//!
//! Turns media URLs into frames, frames into product detections and crops
//! into unit-norm embeddings. Model inference runs on ONNX Runtime behind the
//! `onnx` feature; the detector and embedder themselves only see the
//! [`ProposalModel`] and [`FeatureModel`] seams.

pub mod detector;
pub mod embedder;
pub mod error;
pub mod labels;
pub mod models;
pub mod source;
mod utils;

pub use detector::{ProductDetector, Proposal, ProposalModel};
pub use embedder::{FeatureModel, VisualEmbedder};
pub use error::VisionError;
pub use labels::{CategoryFilter, COCO_CLASSES};
pub use models::{ModelManager, YoloDecoder};
pub use source::{FileFrameSource, HttpFrameSource, VideoSampler};
