//! Gaussian blur for frames and luminance images.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The placeholder
//! segmenter blurs before color thresholding, and the uncertainty
//! ensemble uses a mild blur as one of its perturbations.

use image::GrayImage;

use crate::types::Frame;

/// Sigma OpenCV derives for a 5x5 kernel when no sigma is given.
pub const KERNEL_5X5_SIGMA: f32 = 1.1;

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Gaussian blur to an RGB frame by blurring each channel
/// independently.
///
/// `gaussian_blur_f32` only accepts `GrayImage`, so the frame is split
/// into three single-channel images, blurred, and reassembled. Gaussian
/// blur is linear and per-channel, so this equals blurring in color
/// space. Non-positive sigma values return the frame unchanged.
#[must_use = "returns the blurred frame"]
pub fn gaussian_blur_rgb(frame: &Frame, sigma: f32) -> Frame {
    if sigma <= 0.0 {
        return frame.clone();
    }

    let (w, h) = frame.dimensions();

    let channels: [GrayImage; 3] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([frame.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 3] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    Frame::from_fn(w, h, |x, y| {
        image::Rgb([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame with a sharp red-to-blue boundary at x = 5.
    fn sharp_edge_frame() -> Frame {
        Frame::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 255])
            }
        })
    }

    #[test]
    fn zero_sigma_is_identity() {
        let frame = sharp_edge_frame();
        let result = gaussian_blur_rgb(&frame, 0.0);
        assert_eq!(result.as_raw(), frame.as_raw());
    }

    #[test]
    fn negative_sigma_is_identity_for_gray() {
        let gray = GrayImage::from_fn(4, 4, |x, _| image::Luma([u8::try_from(x * 60).unwrap_or(0)]));
        assert_eq!(gaussian_blur(&gray, -1.0).as_raw(), gray.as_raw());
    }

    #[test]
    fn blur_softens_boundary_per_channel() {
        let result = gaussian_blur_rgb(&sharp_edge_frame(), 1.5);
        let left = result.get_pixel(4, 5).0;
        let right = result.get_pixel(5, 5).0;
        assert!(left[0] < 255 && left[2] > 0, "left of edge should mix: {left:?}");
        assert!(right[0] > 0 && right[2] < 255, "right of edge should mix: {right:?}");
        assert_eq!(left[1], 0, "green channel stays empty");
    }

    #[test]
    fn blur_preserves_dimensions() {
        let frame = Frame::new(13, 7);
        assert_eq!(gaussian_blur_rgb(&frame, 2.0).dimensions(), (13, 7));
    }
}
