//! Photo pipeline: decode an uploaded image, shrink it to fit within
//! [`MAX_IMAGE_DIM`], and re-encode it as an embeddable JPEG data URL.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::{CookbookError, Result};

/// Longest allowed side, in pixels.
pub const MAX_IMAGE_DIM: u32 = 1200;

/// Lossy quality factor on a 0–1 scale.
pub const IMAGE_QUALITY: f32 = 0.8;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Output dimensions for an image of `width` x `height`.
///
/// Images within bounds keep their size. Otherwise the longer side becomes
/// `max_dim` and the shorter side is scaled by the same ratio, rounded to the
/// nearest pixel (never below one).
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn scaled_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }
    let ratio = f64::from(width) / f64::from(height);
    if width > height {
        let h = (f64::from(max_dim) / ratio).round().max(1.0) as u32;
        (max_dim, h)
    } else {
        let w = (f64::from(max_dim) * ratio).round().max(1.0) as u32;
        (w, max_dim)
    }
}

#[allow(clippy::cast_sign_loss)]
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.01, 1.0) * 100.0).round() as u8
}

/// Decode, downscale and re-encode `bytes` with the default bound and quality.
pub fn compress_photo(bytes: &[u8]) -> Result<String> {
    compress_photo_with(bytes, MAX_IMAGE_DIM, IMAGE_QUALITY)
}

pub fn compress_photo_with(bytes: &[u8], max_dim: u32, quality: f32) -> Result<String> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();
    let (target_w, target_h) = scaled_dimensions(width, height, max_dim);

    let img = if (target_w, target_h) == (width, height) {
        img
    } else {
        img.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    // JPEG carries no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut encoded = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut encoded, jpeg_quality(quality));
    rgb.write_with_encoder(encoder)
        .map_err(|e| CookbookError::Decode(format!("Could not encode photo: {e}")))?;

    tracing::debug!(
        width,
        height,
        target_w,
        target_h,
        bytes = encoded.len(),
        "photo compressed"
    );

    Ok(format!("{DATA_URL_PREFIX}{}", B64.encode(&encoded)))
}

/// Run [`compress_photo`] on the blocking pool so the caller's task stays
/// responsive.
pub async fn compress_photo_async(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || compress_photo(&bytes))
        .await
        .map_err(|e| CookbookError::Decode(format!("photo task failed: {e}")))?
}

/// Extract the raw image bytes from an embedded data URL.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| CookbookError::Decode("Photo is not a data URL".to_string()))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        return Err(CookbookError::Decode(
            "Photo is not a base64 data URL".to_string(),
        ));
    }
    B64.decode(payload)
        .map_err(|e| CookbookError::Decode(format!("Photo payload is not valid base64: {e}")))
}

/// Pixel dimensions of an image held in a data URL.
pub fn data_url_dimensions(data_url: &str) -> Result<(u32, u32)> {
    let bytes = decode_data_url(data_url)?;
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CookbookError::Decode(format!("Could not read photo: {e}")))?;
    Ok(reader.into_dimensions()?)
}
