//! Transport encoding of crops

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, RgbImage};

/// JPEG-encode `image` at `quality` (1-100) and wrap it in standard base64.
pub fn jpeg_base64(image: &RgbImage, quality: u8) -> Result<String, ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).encode_image(image)?;
    Ok(STANDARD.encode(buffer))
}
