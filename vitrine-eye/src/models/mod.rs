//! Vision model management and inference

pub mod clip;
pub mod manager;
pub mod yolo;

pub use manager::ModelManager;
pub use yolo::{apply_nms, compute_iou, YoloDecoder};

#[cfg(feature = "onnx")]
pub use clip::ClipModel;
#[cfg(feature = "onnx")]
pub use yolo::YoloModel;
