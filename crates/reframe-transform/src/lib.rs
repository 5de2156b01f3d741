//! Center-crop-then-scale image normalization.
//!
//! [`crop_rect`] is the pure geometry: it picks the largest centered region of
//! the source whose aspect ratio equals the target's. [`center_crop_scale`]
//! decodes, flattens alpha onto white, crops that region, scales it to the
//! exact target size and re-encodes as JPEG.

mod geometry;

pub use geometry::{crop_rect, CropRect};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, RgbaImage};
use reframe_core::TransformSpec;
use thiserror::Error;
use tracing::debug;

/// JPEG quality used for every output (0.9 on a 0..1 scale).
pub const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),
}

/// Seam between the record pipeline and the pixel work.
pub trait ImageTransformer: Send + Sync {
    fn transform(&self, image_bytes: &[u8], spec: &TransformSpec) -> Result<Vec<u8>, TransformError>;
}

/// The production transformer backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropScaleTransformer;

impl ImageTransformer for CropScaleTransformer {
    fn transform(&self, image_bytes: &[u8], spec: &TransformSpec) -> Result<Vec<u8>, TransformError> {
        center_crop_scale(image_bytes, spec)
    }
}

/// Decode `image_bytes`, crop the centered region matching the target aspect
/// ratio, scale it to exactly `spec` and encode the result as JPEG.
pub fn center_crop_scale(image_bytes: &[u8], spec: &TransformSpec) -> Result<Vec<u8>, TransformError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    let scaled = render(&img, spec)?;
    encode_jpeg(&scaled)
}

/// Crop and scale an already decoded image. The result is exactly
/// `spec.target_width() x spec.target_height()` and fully opaque.
pub fn render(img: &DynamicImage, spec: &TransformSpec) -> Result<RgbImage, TransformError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(TransformError::Decode(format!(
            "image has no pixels ({width}x{height})"
        )));
    }

    let rect = crop_rect(width, height, spec);
    debug!("source {width}x{height}, crop {rect:?}, target {spec}");

    let rgba = img.to_rgba8();
    let flat = if rect.is_full(width, height) {
        flatten_onto_white(&rgba)
    } else {
        let cropped = imageops::crop_imm(&rgba, rect.x, rect.y, rect.width, rect.height).to_image();
        flatten_onto_white(&cropped)
    };
    Ok(imageops::resize(
        &flat,
        spec.target_width(),
        spec.target_height(),
        FilterType::Lanczos3,
    ))
}

/// Composite every pixel over an opaque white background.
fn flatten_onto_white(src: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::from_pixel(src.width(), src.height(), Rgb([255, 255, 255]));
    for (x, y, px) in src.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, TransformError> {
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
        encoder
            .encode_image(img)
            .map_err(|e| TransformError::Encode(e.to_string()))?;
    }
    Ok(buf)
}
