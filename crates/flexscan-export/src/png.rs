//! PNG encoding for frames and grayscale images.

use flexscan_pipeline::{Frame, types::GrayImage};
use image::ImageEncoder;

use crate::ExportError;

/// Encode an RGB frame as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails (for example for a
/// zero-sized frame).
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, ExportError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(png_bytes)
}

/// Encode a grayscale image as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if encoding fails.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, ExportError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;
    Ok(png_bytes)
}
