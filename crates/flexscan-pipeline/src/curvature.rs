//! Length and curvature analysis of an ordered centerline.
//!
//! Lengths come straight from the pixel path: the straight length is the
//! chord from the first to the last point, the arc length is the sum of
//! the step lengths.
//!
//! Curvature is measured as tangent deviation from the base-to-tip
//! chord:
//!
//! 1. both coordinate sequences are smoothed with a 5-point moving
//!    average (the ends are padded with copies of the end values),
//! 2. tangents are central differences of the smoothed coordinates
//!    (one-sided at the two ends),
//! 3. each tangent angle is compared with the angle of the smoothed
//!    chord and wrapped into `[-180, 180)` degrees.
//!
//! The largest absolute deviation is the maximum curvature, and the
//! first point where it occurs is the hinge. A straight path reads 0
//! degrees, a right-angle riser between two collinear arms reads 90.

use serde::{Deserialize, Serialize};

use crate::types::{CenterlinePath, Point};

/// Moving-average window used before differentiating.
pub const SMOOTHING_WINDOW: usize = 5;

/// Paths shorter than this report zero curvature.
pub const MIN_POINTS_FOR_CURVATURE: usize = SMOOTHING_WINDOW;

/// Geometry of a centerline, in pixels and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurvatureAnalysis {
    /// Sum of the distances between consecutive path points.
    pub arc_length_px: f64,
    /// Distance between the first and last path points.
    pub straight_length_px: f64,
    /// Largest tangent deviation from the base-to-tip chord, in `[0, 180]`.
    pub max_curvature_deg: f64,
    /// Index of the path point where the maximum deviation occurs.
    pub hinge_index: usize,
    /// `hinge_index` as a fraction of the path length, in `[0, 1]`.
    pub hinge_location_ratio: f64,
}

/// Analyze a centerline.
///
/// Empty and single-point paths produce all zeros. Paths with fewer than
/// [`MIN_POINTS_FOR_CURVATURE`] points still report their lengths but
/// zero curvature and hinge index 0.
#[must_use = "returns the curvature analysis"]
pub fn analyze(path: &CenterlinePath) -> CurvatureAnalysis {
    let points = path.to_points();

    let arc_length_px = arc_length(&points);
    let straight_length_px = chord_length(&points);

    let (max_curvature_deg, hinge_index) = if points.len() < MIN_POINTS_FOR_CURVATURE {
        (0.0, 0)
    } else {
        max_tangent_deviation(&points)
    };

    CurvatureAnalysis {
        arc_length_px,
        straight_length_px,
        max_curvature_deg,
        hinge_index,
        hinge_location_ratio: hinge_ratio(hinge_index, points.len()),
    }
}

/// Sum of consecutive point distances (0 for fewer than two points).
#[must_use]
pub fn arc_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Distance between the first and last points (0 for fewer than two points).
#[must_use]
pub fn chord_length(points: &[Point]) -> f64 {
    match (points.first(), points.last()) {
        (Some(&first), Some(&last)) if points.len() >= 2 => first.distance(last),
        _ => 0.0,
    }
}

/// Hinge position as a fraction of the path, clamped to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn hinge_ratio(hinge_index: usize, len: usize) -> f64 {
    if len <= 1 {
        return 0.0;
    }
    (hinge_index as f64 / (len - 1) as f64).clamp(0.0, 1.0)
}

/// Wrap an angle in degrees into `[-180, 180)`.
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Largest absolute tangent deviation from the smoothed chord, and the
/// first index where it occurs. Requires at least two points.
fn max_tangent_deviation(points: &[Point]) -> (f64, usize) {
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let sx = moving_average(&xs, SMOOTHING_WINDOW);
    let sy = moving_average(&ys, SMOOTHING_WINDOW);
    let dx = gradient(&sx);
    let dy = gradient(&sy);

    let n = sx.len();
    let reference = (sy[n - 1] - sy[0]).atan2(sx[n - 1] - sx[0]).to_degrees();

    let mut max_deviation = 0.0;
    let mut hinge = 0;
    for (i, (&tx, &ty)) in dx.iter().zip(&dy).enumerate() {
        let deviation = wrap_degrees(ty.atan2(tx).to_degrees() - reference).abs();
        if deviation > max_deviation {
            max_deviation = deviation;
            hinge = i;
        }
    }
    (max_deviation, hinge)
}

/// Centered moving average with edge padding; output length equals input.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return Vec::new();
    };
    let half = window / 2;
    let padded: Vec<f64> = std::iter::repeat_n(first, half)
        .chain(values.iter().copied())
        .chain(std::iter::repeat_n(last, window - 1 - half))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let divisor = window as f64;
    padded
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / divisor)
        .collect()
}

/// Finite-difference derivative: central differences inside, one-sided
/// differences at both ends. Requires at least two values.
fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| match i {
            0 => values[1] - values[0],
            i if i == n - 1 => values[n - 1] - values[n - 2],
            i => (values[i + 1] - values[i - 1]) / 2.0,
        })
        .collect()
}
