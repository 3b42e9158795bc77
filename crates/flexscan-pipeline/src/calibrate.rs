//! Pixel-to-millimeter scale calibration from in-frame markers.
//!
//! Every decoded marker contributes the mean of its four side lengths;
//! the calibration averages those over all markers and divides by the
//! printed side length. Finding no marker is a normal outcome: the
//! calibration is simply absent and physical lengths downstream are
//! reported as zero rather than guessed.

use image::GrayImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grayscale;
use crate::marker::{DetectedMarker, MarkerDetector};
use crate::types::Frame;

/// Outline color for detected markers.
const OUTLINE_COLOR: image::Rgb<u8> = image::Rgb([0, 220, 0]);

/// Color of the dot marking each marker's first corner.
const FIRST_CORNER_COLOR: image::Rgb<u8> = image::Rgb([220, 0, 0]);

/// Scale derived from the markers in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleCalibration {
    /// Pixels per millimeter, absent when no marker was found.
    pub pixels_per_mm: Option<f64>,
    /// Mean marker side length in pixels, absent when no marker was found.
    pub mean_marker_side_px: Option<f64>,
    /// Number of markers the detector decoded.
    pub detected_markers: usize,
}

impl ScaleCalibration {
    /// Derive the scale from decoded markers and the printed side length.
    ///
    /// `pixels_per_mm` stays absent when there are no markers or when
    /// `marker_side_mm` is not positive.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_markers(markers: &[DetectedMarker], marker_side_mm: f64) -> Self {
        if markers.is_empty() {
            return Self::default();
        }
        let mean_side =
            markers.iter().map(DetectedMarker::mean_side_px).sum::<f64>() / markers.len() as f64;
        let pixels_per_mm = (marker_side_mm > 0.0).then(|| mean_side / marker_side_mm);
        Self {
            pixels_per_mm,
            mean_marker_side_px: Some(mean_side),
            detected_markers: markers.len(),
        }
    }

    /// Returns `true` if a usable scale is present.
    #[must_use]
    pub fn is_calibrated(&self) -> bool {
        self.pixels_per_mm.is_some_and(|p| p.is_finite() && p > 0.0)
    }

    /// Convert a pixel length to millimeters, or 0 without a usable scale.
    #[must_use]
    pub fn px_to_mm(&self, px: f64) -> f64 {
        match self.pixels_per_mm {
            Some(ppm) if ppm.is_finite() && ppm > 0.0 => px / ppm,
            _ => 0.0,
        }
    }
}

/// Output of [`ScaleCalibrator::calibrate`].
#[derive(Debug, Clone)]
pub struct Calibration {
    /// The derived scale.
    pub scale: ScaleCalibration,
    /// Every decoded marker.
    pub markers: Vec<DetectedMarker>,
    /// A copy of the input frame with marker outlines drawn on it.
    pub annotated: Frame,
}

/// Detects markers and turns them into a [`ScaleCalibration`].
#[derive(Debug, Clone)]
pub struct ScaleCalibrator {
    marker_side_mm: f64,
    detector: MarkerDetector,
}

impl ScaleCalibrator {
    /// A calibrator for markers printed `marker_side_mm` wide, using the
    /// default detector.
    #[must_use]
    pub fn new(marker_side_mm: f64) -> Self {
        Self::with_detector(marker_side_mm, MarkerDetector::default())
    }

    /// A calibrator with a custom detector.
    #[must_use]
    pub const fn with_detector(marker_side_mm: f64, detector: MarkerDetector) -> Self {
        Self {
            marker_side_mm,
            detector,
        }
    }

    /// Printed marker side length in millimeters.
    #[must_use]
    pub const fn marker_side_mm(&self) -> f64 {
        self.marker_side_mm
    }

    /// Calibrate a color frame and return an annotated copy.
    ///
    /// The input frame is left untouched.
    #[must_use = "returns the calibration"]
    pub fn calibrate(&self, frame: &Frame) -> Calibration {
        let (scale, markers) = self.measure(&grayscale::luminance(frame));
        let annotated = annotate_markers(frame, &markers);
        Calibration {
            scale,
            markers,
            annotated,
        }
    }

    /// Calibrate from an already computed luminance image.
    ///
    /// The live loop computes luminance once per frame and shares it
    /// between calibration and quality scoring.
    #[must_use = "returns the calibration"]
    pub fn measure(&self, gray: &GrayImage) -> (ScaleCalibration, Vec<DetectedMarker>) {
        let markers = self.detector.detect(gray);
        let scale = ScaleCalibration::from_markers(&markers, self.marker_side_mm);
        debug!(
            markers = scale.detected_markers,
            pixels_per_mm = ?scale.pixels_per_mm,
            "calibrated frame"
        );
        (scale, markers)
    }
}

/// Draw marker outlines (and a dot on each first corner) onto a copy of
/// `frame`.
#[must_use = "returns the annotated frame"]
#[allow(clippy::cast_possible_truncation)]
pub fn annotate_markers(frame: &Frame, markers: &[DetectedMarker]) -> Frame {
    let mut annotated = frame.clone();
    for marker in markers {
        for i in 0..4 {
            let a = marker.corners[i];
            let b = marker.corners[(i + 1) % 4];
            draw_line_segment_mut(
                &mut annotated,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                OUTLINE_COLOR,
            );
        }
        let first = marker.corners[0];
        draw_filled_circle_mut(
            &mut annotated,
            (first.x.round() as i32, first.y.round() as i32),
            3,
            FIRST_CORNER_COLOR,
        );
    }
    annotated
}
