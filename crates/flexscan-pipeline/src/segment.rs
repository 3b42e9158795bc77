//! Region-of-interest segmentation: color frame to binary mask.
//!
//! This module defines the [`Segmenter`] trait for pluggable segmentation
//! strategies and the [`SegmenterKind`] enum for selecting one at runtime.
//! Closures `Fn(&Frame) -> Segmentation` implement the trait too, which is
//! how tests and callers plug in a learned model.
//!
//! The shipped [`SegmenterKind::ColorThreshold`] strategy is a classical
//! placeholder:
//!
//! 1. Gaussian blur (5x5-equivalent sigma),
//! 2. skin-tone HSV range on OpenCV's 8-bit scale (H 0..=25, S >= 20,
//!    V >= 50),
//! 3. OR with dilated Canny edges of the unblurred luminance,
//! 4. 5x5 median filter, closing and opening,
//! 5. keep the largest connected region and fill its holes.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::blur;
use crate::grayscale;
use crate::types::{BinaryMask, Dimensions, FOREGROUND, Frame, PipelineError};

/// A segmentation result.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Foreground = region of interest.
    pub mask: BinaryMask,
    /// The input frame with the mask tinted on top, for display.
    pub overlay: Frame,
}

impl Segmentation {
    /// Wrap a mask and build the standard green-tint overlay for `frame`.
    #[must_use]
    pub fn with_tint(frame: &Frame, mask: BinaryMask) -> Self {
        let overlay = tint_mask(frame, &mask);
        Self { mask, overlay }
    }

    /// Check that the mask matches `frame`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DimensionMismatch`] if the mask size
    /// differs from the frame size.
    pub fn check_dimensions(&self, frame: &Frame) -> Result<(), PipelineError> {
        let expected = Dimensions::of(frame);
        let actual = self.mask.dimensions();
        if expected == actual {
            Ok(())
        } else {
            Err(PipelineError::DimensionMismatch {
                what: "segmentation mask",
                expected,
                actual,
            })
        }
    }
}

/// Trait for segmentation strategies.
pub trait Segmenter {
    /// Segment the region of interest in `frame`.
    ///
    /// The returned mask must have the frame's dimensions.
    fn segment(&self, frame: &Frame) -> Segmentation;
}

impl<F> Segmenter for F
where
    F: Fn(&Frame) -> Segmentation,
{
    fn segment(&self, frame: &Frame) -> Segmentation {
        self(frame)
    }
}

/// Run `segmenter` and verify the mask size.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the segmenter
/// returned a mask of the wrong size.
pub fn segment_checked<S: Segmenter + ?Sized>(
    segmenter: &S,
    frame: &Frame,
) -> Result<Segmentation, PipelineError> {
    let segmentation = segmenter.segment(frame);
    segmentation.check_dimensions(frame)?;
    Ok(segmentation)
}

/// Selects which segmentation strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmenterKind {
    /// Classical color threshold + edge fusion placeholder.
    #[default]
    ColorThreshold,
}

impl Segmenter for SegmenterKind {
    fn segment(&self, frame: &Frame) -> Segmentation {
        match *self {
            Self::ColorThreshold => {
                let mask = color_threshold_mask(frame);
                Segmentation::with_tint(frame, mask)
            }
        }
    }
}

/// Hue/saturation/value in OpenCV's 8-bit convention: hue in `0..180`
/// (degrees halved), saturation and value in `0..=255`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn rgb_to_hsv8(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f64::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        60.0f64.mul_add((b - r) / diff, 120.0)
    } else {
        60.0f64.mul_add((r - g) / diff, 240.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        (h / 2.0).round().min(179.0) as u8,
        s.round() as u8,
        v as u8,
    ]
}

/// Whether an HSV8 triple falls in the placeholder skin-tone range.
#[must_use]
pub const fn is_skin_tone(hsv: [u8; 3]) -> bool {
    let [h, s, v] = hsv;
    h <= 25 && s >= 20 && v >= 50
}

/// The full placeholder segmentation pipeline.
#[must_use = "returns the segmentation mask"]
pub fn color_threshold_mask(frame: &Frame) -> BinaryMask {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 {
        return BinaryMask::new(w, h);
    }

    let blurred = blur::gaussian_blur_rgb(frame, blur::KERNEL_5X5_SIGMA);
    let color = GrayImage::from_fn(w, h, |x, y| {
        let hsv = rgb_to_hsv8(blurred.get_pixel(x, y).0);
        image::Luma([if is_skin_tone(hsv) { FOREGROUND } else { 0 }])
    });

    let edges = imageproc::edges::canny(&grayscale::luminance(frame), 60.0, 150.0);
    let edges = imageproc::morphology::dilate(&edges, Norm::LInf, 1);

    let combined = GrayImage::from_fn(w, h, |x, y| {
        image::Luma([color.get_pixel(x, y).0[0] | edges.get_pixel(x, y).0[0]])
    });
    let combined = imageproc::filter::median_filter(&combined, 2, 2);

    let closed = imageproc::morphology::close(&combined, Norm::L1, 6);
    let opened = imageproc::morphology::open(&closed, Norm::L1, 3);

    fill_holes(&largest_region(&BinaryMask::from_gray(opened)))
}

/// Keep only the largest 8-connected foreground region.
#[must_use]
pub fn largest_region(mask: &BinaryMask) -> BinaryMask {
    let labels = connected_components(mask.as_gray(), Connectivity::Eight, image::Luma([0u8]));

    let mut sizes: Vec<u64> = Vec::new();
    for p in labels.pixels() {
        let label = p.0[0] as usize;
        if label == 0 {
            continue;
        }
        if sizes.len() <= label {
            sizes.resize(label + 1, 0);
        }
        sizes[label] += 1;
    }

    // First label wins ties so the result is deterministic.
    let Some(best) = sizes
        .iter()
        .enumerate()
        .skip(1)
        .fold(None, |best: Option<(usize, u64)>, (label, &size)| match best {
            Some((_, best_size)) if best_size >= size => best,
            _ => Some((label, size)),
        })
        .map(|(label, _)| label)
    else {
        return BinaryMask::new(mask.width(), mask.height());
    };

    BinaryMask::from_fn(mask.width(), mask.height(), |x, y| {
        labels.get_pixel(x, y).0[0] as usize == best
    })
}

/// Fill background regions that do not reach the image border.
#[must_use]
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let (w, h) = (mask.width(), mask.height());
    if w == 0 || h == 0 {
        return mask.clone();
    }
    let background = GrayImage::from_fn(w, h, |x, y| {
        image::Luma([if mask.is_set(x, y) { 0 } else { FOREGROUND }])
    });
    let labels = connected_components(&background, Connectivity::Four, image::Luma([0u8]));

    let mut outside = std::collections::HashSet::new();
    for x in 0..w {
        outside.insert(labels.get_pixel(x, 0).0[0]);
        outside.insert(labels.get_pixel(x, h - 1).0[0]);
    }
    for y in 0..h {
        outside.insert(labels.get_pixel(0, y).0[0]);
        outside.insert(labels.get_pixel(w - 1, y).0[0]);
    }

    BinaryMask::from_fn(w, h, |x, y| {
        let label = labels.get_pixel(x, y).0[0];
        mask.is_set(x, y) || (label != 0 && !outside.contains(&label))
    })
}

/// Blend pure green into the masked pixels (70% frame, 30% green).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn tint_mask(frame: &Frame, mask: &BinaryMask) -> Frame {
    let mut overlay = frame.clone();
    for (x, y, p) in overlay.enumerate_pixels_mut() {
        if mask.is_set(x, y) {
            let tint = [0u16, 255, 0];
            for (c, t) in p.0.iter_mut().zip(tint) {
                *c = ((u16::from(*c) * 7 + t * 3 + 5) / 10) as u8;
            }
        }
    }
    overlay
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SKIN: image::Rgb<u8> = image::Rgb([200, 140, 110]);
    const BACKDROP: image::Rgb<u8> = image::Rgb([40, 60, 160]);

    #[test]
    fn hsv_of_primaries() {
        assert_eq!(rgb_to_hsv8([255, 0, 0]), [0, 255, 255]);
        assert_eq!(rgb_to_hsv8([0, 255, 0]), [60, 255, 255]);
        assert_eq!(rgb_to_hsv8([0, 0, 255]), [120, 255, 255]);
        assert_eq!(rgb_to_hsv8([128, 128, 128]), [0, 0, 128]);
    }

    #[test]
    fn skin_sample_is_in_range_and_backdrop_is_not() {
        assert!(is_skin_tone(rgb_to_hsv8(SKIN.0)));
        assert!(!is_skin_tone(rgb_to_hsv8(BACKDROP.0)));
        assert!(!is_skin_tone(rgb_to_hsv8([20, 10, 5])), "too dark");
    }

    #[test]
    fn segments_skin_colored_block() {
        let frame = Frame::from_fn(120, 80, |x, y| {
            if (30..90).contains(&x) && (20..60).contains(&y) {
                SKIN
            } else {
                BACKDROP
            }
        });
        let mask = color_threshold_mask(&frame);

        assert!(mask.is_set(60, 40), "block center should be foreground");
        assert!(!mask.is_set(5, 5), "backdrop corner should be background");
        let ratio = mask.foreground_ratio();
        assert!(
            (0.15..0.40).contains(&ratio),
            "foreground ratio {ratio} should be near the block's 25%"
        );
    }

    #[test]
    fn uniform_backdrop_gives_empty_mask() {
        let frame = Frame::from_pixel(50, 40, BACKDROP);
        assert!(color_threshold_mask(&frame).is_blank());
    }

    #[test]
    fn largest_region_drops_smaller_blobs() {
        let mask = BinaryMask::from_fn(30, 30, |x, y| {
            ((2..6).contains(&x) && (2..6).contains(&y)) || ((10..25).contains(&x) && (10..25).contains(&y))
        });
        let largest = largest_region(&mask);
        assert!(!largest.is_set(3, 3));
        assert!(largest.is_set(15, 15));
        assert_eq!(largest.count_foreground(), 225);
    }

    #[test]
    fn largest_region_of_empty_mask_is_empty() {
        assert!(largest_region(&BinaryMask::new(5, 5)).is_blank());
    }

    #[test]
    fn fill_holes_fills_enclosed_background_only() {
        // Square ring with a square hole in the middle.
        let mask = BinaryMask::from_fn(20, 20, |x, y| {
            let ring = (4..16).contains(&x) && (4..16).contains(&y);
            let hole = (7..13).contains(&x) && (7..13).contains(&y);
            ring && !hole
        });
        let filled = fill_holes(&mask);
        assert!(filled.is_set(10, 10), "hole should be filled");
        assert!(!filled.is_set(1, 1), "outside stays background");
        assert_eq!(filled.count_foreground(), 144);
    }

    #[test]
    fn tint_blends_toward_green() {
        let frame = Frame::from_pixel(2, 1, image::Rgb([100, 100, 100]));
        let mask = BinaryMask::from_fn(2, 1, |x, _| x == 0);
        let overlay = tint_mask(&frame, &mask);
        assert_eq!(overlay.get_pixel(0, 0).0, [70, 147, 70]);
        assert_eq!(overlay.get_pixel(1, 0).0, [100, 100, 100]);
    }

    #[test]
    fn closure_segmenter_and_dimension_check() {
        let frame = Frame::new(10, 10);
        let wrong = |_: &Frame| Segmentation {
            mask: BinaryMask::new(5, 5),
            overlay: Frame::new(5, 5),
        };
        assert!(matches!(
            segment_checked(&wrong, &frame),
            Err(PipelineError::DimensionMismatch { .. })
        ));

        let right = |f: &Frame| Segmentation::with_tint(f, BinaryMask::new(f.width(), f.height()));
        assert!(segment_checked(&right, &frame).is_ok());
    }

    #[test]
    fn default_is_color_threshold() {
        assert_eq!(SegmenterKind::default(), SegmenterKind::ColorThreshold);
    }
}
