//! Utility functions for vision processing

use crate::error::VisionError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use vitrine_core::BoundingBox;

/// CLIP image normalization constants
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Plain [0, 1] scaling, as YOLO expects
pub const UNIT_MEAN: [f32; 3] = [0.0, 0.0, 0.0];
pub const UNIT_STD: [f32; 3] = [1.0, 1.0, 1.0];

/// Upper bound on tensor elements built from one image
const MAX_TENSOR_ELEMENTS: usize = 100_000_000;

/// Convert an RGB image to a planar `[3, H, W]` float tensor, scaling to
/// [0, 1] and then applying `(x - mean) / std` per channel.
pub fn rgb_to_chw_tensor(
    image: &RgbImage,
    mean: [f32; 3],
    std: [f32; 3],
) -> Result<Vec<f32>, VisionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::Processing("Image dimensions cannot be zero".to_string()));
    }

    let plane = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| VisionError::Processing("Image too large, would overflow".to_string()))?;
    let total = plane
        .checked_mul(3)
        .filter(|t| *t <= MAX_TENSOR_ELEMENTS)
        .ok_or_else(|| VisionError::Processing("Tensor too large (max 100M elements)".to_string()))?;

    let mut tensor = vec![0.0f32; total];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            tensor[c * plane + i] = (value - mean[c]) / std[c];
        }
    }

    Ok(tensor)
}

/// Stretch an image to exactly `width` x `height`.
pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Resize so the shorter side equals `side` (bicubic), then take the centred
/// `side` x `side` square.
pub fn resize_shortest_center_crop(image: &RgbImage, side: u32) -> Result<RgbImage, VisionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || side == 0 {
        return Err(VisionError::Processing("Cannot resize an empty image".to_string()));
    }

    let scale = side as f64 / width.min(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(side);
    let new_height = ((height as f64 * scale).round() as u32).max(side);

    let resized = imageops::resize(image, new_width, new_height, FilterType::CatmullRom);
    let x = (new_width - side) / 2;
    let y = (new_height - side) / 2;

    Ok(imageops::crop_imm(&resized, x, y, side, side).to_image())
}

/// Copy the pixels under `bbox`. The box must lie inside the image.
pub fn crop(image: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    imageops::crop_imm(image, bbox.x1, bbox.y1, bbox.width(), bbox.height()).to_image()
}
