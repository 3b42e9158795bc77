//! Image decoding and luminance conversion.
//!
//! Frames enter the pipeline either as raw encoded bytes (a still image
//! handed to `analyze`) or as already-decoded [`Frame`]s from a frame
//! source. Every quality and marker stage works on the single-channel
//! luminance produced by [`luminance`].

use image::GrayImage;

use crate::types::{Frame, PipelineError};

/// Decode raw image bytes into an RGB frame.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// can decode). Alpha is dropped.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert a color frame to 8-bit luminance.
///
/// Uses the BT.601 weights `0.299*R + 0.587*G + 0.114*B`, rounded to the
/// nearest integer, so thresholds tuned against common camera tooling
/// carry over unchanged.
#[must_use = "returns the luminance image"]
pub fn luminance(frame: &Frame) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.get_pixel(x, y).0;
        let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
        // weighted <= 255_000, so the quotient always fits in a u8.
        #[allow(clippy::cast_possible_truncation)]
        let value = ((weighted + 500) / 1000) as u8;
        image::Luma([value])
    })
}

/// Mean pixel value of a grayscale image (0 for an empty image).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_intensity(gray: &GrayImage) -> f64 {
    let count = gray.as_raw().len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = gray.as_raw().iter().map(|&v| u64::from(v)).sum();
    sum as f64 / count as f64
}
