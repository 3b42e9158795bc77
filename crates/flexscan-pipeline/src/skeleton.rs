//! Morphological skeletonization of a binary mask.
//!
//! Reduces a region-of-interest mask to a thin medial set using the
//! classic erode/open/subtract loop:
//!
//! 1. erode the working mask with a 4-connected cross element,
//! 2. dilate the eroded result (a morphological opening of the working
//!    mask),
//! 3. pixels present in the working mask but missing from the opening
//!    are added to the skeleton,
//! 4. the eroded mask becomes the working mask.
//!
//! The loop stops once erosion leaves nothing behind, so it runs at most
//! "mask radius" rounds. Pixels outside the frame never count as
//! background, so foreground touching the frame edge does not erode
//! from that side. A working mask that covers the whole frame cannot
//! erode at all; it is kept in the skeleton as is, so a frame-filling
//! line (a full one-pixel-wide image, say) is still a fixed point.
//!
//! The result is not guaranteed to be branch-free or connected; the
//! centerline tracer copes with both.

use imageproc::distance_transform::Norm;

use crate::types::{BinaryMask, FOREGROUND, Skeleton};

/// Reduce `mask` to its morphological skeleton.
///
/// The output has the same dimensions as the input and only contains
/// pixels that are foreground in `mask`. An empty mask yields an empty
/// skeleton.
///
/// A mask with no background pixel at all never erodes and is returned
/// unchanged.
#[must_use = "returns the skeleton"]
pub fn skeletonize(mask: &BinaryMask) -> Skeleton {
    let mut skeleton = vec![0u8; mask.as_gray().as_raw().len()];
    let mut work = mask.as_gray().clone();

    while work.as_raw().iter().any(|&v| v != 0) {
        // L1 distance 1 is the 3x3 cross structuring element.
        let eroded = imageproc::morphology::erode(&work, Norm::L1, 1);
        if eroded.as_raw() == work.as_raw() {
            for (s, &w) in skeleton.iter_mut().zip(work.as_raw()) {
                if w != 0 {
                    *s = FOREGROUND;
                }
            }
            break;
        }
        let opened = imageproc::morphology::dilate(&eroded, Norm::L1, 1);

        for ((s, &w), &o) in skeleton
            .iter_mut()
            .zip(work.as_raw())
            .zip(opened.as_raw())
        {
            if w != 0 && o == 0 {
                *s = FOREGROUND;
            }
        }

        work = eroded;
    }

    let gray = image::GrayImage::from_raw(mask.width(), mask.height(), skeleton)
        .unwrap_or_else(|| image::GrayImage::new(mask.width(), mask.height()));
    Skeleton::new(BinaryMask::from_gray(gray))
}
