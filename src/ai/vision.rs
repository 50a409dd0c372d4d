//! Image normalization for the vision backend
//!
//! Every still is decoded, downscaled so its longest edge is at most
//! [`MAX_DIMENSION`], flattened to RGB, and re-encoded as JPEG at
//! [`JPEG_QUALITY`] before upload.

use crate::error::ClassifyError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;

/// Maximum image dimension (width or height)
pub const MAX_DIMENSION: u32 = 1024;

/// JPEG quality used for uploads
pub const JPEG_QUALITY: u8 = 85;

/// Prepare encoded image bytes for upload
pub fn prepare_image_for_vision(image_data: &[u8]) -> Result<Vec<u8>, ClassifyError> {
    let img = image::load_from_memory(image_data)?;
    encode_jpeg(resize_if_needed(img))
}

/// Resize image if it exceeds maximum dimensions, keeping aspect ratio
fn resize_if_needed(img: DynamicImage) -> DynamicImage {
    if img.width() <= MAX_DIMENSION && img.height() <= MAX_DIMENSION {
        return img;
    }

    img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
}

fn encode_jpeg(img: DynamicImage) -> Result<Vec<u8>, ClassifyError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb.write_with_encoder(encoder)?;

    Ok(buffer)
}

/// Load and prepare an image file; decoding runs off the async runtime
pub async fn load_image_for_vision(path: &Path) -> Result<Vec<u8>, ClassifyError> {
    let data = tokio::fs::read(path).await?;
    prepare_on_blocking_pool(data).await
}

/// Prepare already-loaded bytes (e.g. an extracted video frame) off the async runtime
pub async fn prepare_on_blocking_pool(data: Vec<u8>) -> Result<Vec<u8>, ClassifyError> {
    tokio::task::spawn_blocking(move || prepare_image_for_vision(&data))
        .await
        .map_err(|e| ClassifyError::Task(e.to_string()))?
}
