//! Stage two of the image pipeline: decode, resize, re-encode.
//!
//! Every acquired image is normalized before embedding: decoded with format
//! sniffing, scaled down to the configured width ceiling when wider (never
//! enlarged), and re-encoded in its own format family — JPEG at the
//! configured quality, PNG and WebP losslessly. Unrecognized source formats
//! fall back to JPEG, which every document viewer renders.

use crate::error::ImageError;
use crate::model::ImageKind;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

/// Widest an embedded image renders in the output document. Larger stored
/// widths are scaled down at display time by [`display_size`].
pub const DISPLAY_MAX_WIDTH: u32 = 600;

/// The result of transcoding: normalized bytes plus their stored geometry.
#[derive(Debug, Clone)]
pub struct TranscodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: ImageKind,
}

/// Decode `bytes`, resize to at most `max_width`, re-encode.
///
/// `source` only labels errors.
pub fn transcode(
    bytes: &[u8],
    source: &str,
    max_width: u32,
    quality: u8,
) -> Result<TranscodedImage, ImageError> {
    let format = image::guess_format(bytes)
        .ok()
        .and_then(kind_for)
        .unwrap_or(ImageKind::Jpeg);

    let mut img = image::load_from_memory(bytes).map_err(|err| ImageError::Decode {
        source: source.to_string(),
        reason: err.to_string(),
    })?;

    let (orig_w, orig_h) = img.dimensions();
    if orig_w > max_width {
        let scaled_h = ((orig_h as u64 * max_width as u64) / orig_w as u64).max(1) as u32;
        debug!(
            source,
            from = format!("{orig_w}x{orig_h}"),
            to = format!("{max_width}x{scaled_h}"),
            "resizing image"
        );
        img = img.resize_exact(max_width, scaled_h, image::imageops::FilterType::Lanczos3);
    }

    let (width, height) = img.dimensions();
    let bytes = encode(&img, format, quality)?;
    Ok(TranscodedImage {
        bytes,
        width,
        height,
        format,
    })
}

/// Dimensions and format of already-transcoded bytes (cached blobs whose
/// index metadata was lost).
pub fn probe(bytes: &[u8], source: &str) -> Result<(u32, u32, ImageKind), ImageError> {
    let format = image::guess_format(bytes)
        .ok()
        .and_then(kind_for)
        .unwrap_or(ImageKind::Jpeg);
    let img = image::load_from_memory(bytes).map_err(|err| ImageError::Decode {
        source: source.to_string(),
        reason: err.to_string(),
    })?;
    let (w, h) = img.dimensions();
    Ok((w, h, format))
}

/// Display geometry for stored dimensions: capped at
/// [`DISPLAY_MAX_WIDTH`], height scaled by the same ratio.
pub fn display_size(width: u32, height: u32) -> (u32, u32) {
    if width <= DISPLAY_MAX_WIDTH {
        return (width, height);
    }
    let scaled_h = ((height as u64 * DISPLAY_MAX_WIDTH as u64) / width as u64).max(1) as u32;
    (DISPLAY_MAX_WIDTH, scaled_h)
}

fn kind_for(format: ImageFormat) -> Option<ImageKind> {
    match format {
        ImageFormat::Jpeg => Some(ImageKind::Jpeg),
        ImageFormat::Png => Some(ImageKind::Png),
        ImageFormat::WebP => Some(ImageKind::WebP),
        _ => None,
    }
}

fn encode(img: &DynamicImage, format: ImageKind, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let result = match format {
        // JPEG has no alpha; flatten to RGB first.
        ImageKind::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality)),
        ImageKind::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        ImageKind::WebP => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
    };
    result.map_err(|err| ImageError::Encode {
        reason: err.to_string(),
    })?;
    Ok(buf)
}
