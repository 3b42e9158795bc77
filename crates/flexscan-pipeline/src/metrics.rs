//! Physical-unit metrics and the mask-to-metrics measurement chain.

use serde::{Deserialize, Serialize};

use crate::calibrate::ScaleCalibration;
use crate::centerline;
use crate::curvature::{self, CurvatureAnalysis};
use crate::skeleton;
use crate::types::{BinaryMask, CenterlinePath, Skeleton};

/// Measurements reported for one capture.
///
/// Lengths are in millimeters and are 0 whenever the frame had no usable
/// scale; the angle and the hinge ratio do not depend on the scale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Path length along the centerline.
    pub arc_length_mm: f64,
    /// Largest tangent deviation from the base-to-tip chord, in degrees.
    pub max_curvature_deg: f64,
    /// Straight (chord) length from base to tip.
    #[serde(rename = "length_mm")]
    pub straight_length_mm: f64,
    /// Where the hinge sits along the path, 0 at the base and 1 at the tip.
    pub hinge_location_ratio: f64,
}

impl Metrics {
    /// Convert a pixel-space analysis using `scale`.
    #[must_use]
    pub fn from_analysis(analysis: &CurvatureAnalysis, scale: &ScaleCalibration) -> Self {
        Self {
            arc_length_mm: scale.px_to_mm(analysis.arc_length_px),
            max_curvature_deg: analysis.max_curvature_deg,
            straight_length_mm: scale.px_to_mm(analysis.straight_length_px),
            hinge_location_ratio: analysis.hinge_location_ratio,
        }
    }
}

/// Everything produced while measuring one mask.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Physical-unit metrics.
    pub metrics: Metrics,
    /// Pixel-space geometry behind the metrics.
    pub analysis: CurvatureAnalysis,
    /// Ordered centerline, base first.
    pub path: CenterlinePath,
    /// Skeleton the centerline was traced through.
    pub skeleton: Skeleton,
}

/// Run skeletonization, tracing, and curvature analysis on `mask` and
/// convert the result with `scale`.
///
/// An empty mask is not an error; it yields an empty path and zero
/// metrics.
#[must_use = "returns the measurement"]
pub fn measure_mask(mask: &BinaryMask, scale: &ScaleCalibration) -> Measurement {
    let skeleton = skeleton::skeletonize(mask);
    let path = centerline::trace_centerline(&skeleton);
    let analysis = curvature::analyze(&path);
    Measurement {
        metrics: Metrics::from_analysis(&analysis, scale),
        analysis,
        path,
        skeleton,
    }
}
