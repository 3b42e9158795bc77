//! Per-frame capture quality.
//!
//! Four equally weighted components, each a score in `[0, 1]` plus an
//! acceptability flag: lighting, stability against the previous frame,
//! marker distance (apparent marker size relative to the frame), and
//! framing (how much of the frame the segmented region covers).

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::grayscale;
use crate::types::Dimensions;

/// Mean luminance the lighting score peaks at.
pub const LIGHTING_IDEAL: f64 = 140.0;
/// Distance from the ideal at which the lighting score reaches 0.
pub const LIGHTING_SPREAD: f64 = 60.0;
/// Acceptable mean luminance, inclusive.
pub const LIGHTING_RANGE: (f64, f64) = (80.0, 200.0);

/// Mean absolute difference at which the stability score reaches 0.
pub const MOTION_SCALE: f64 = 20.0;
/// Motion must stay strictly below this to be acceptable.
pub const MOTION_LIMIT: f64 = 8.0;
/// Stability score when there is nothing to compare against.
pub const NO_REFERENCE_STABILITY: f64 = 0.5;

/// Ideal marker side as a fraction of the frame diagonal.
pub const MARKER_IDEAL_FRACTION: f64 = 0.06;
/// Side error (fraction of the diagonal) at which the score reaches 0.
pub const MARKER_TOLERANCE_FRACTION: f64 = 0.04;
/// Acceptable marker side as fractions of the diagonal, inclusive.
pub const MARKER_RANGE_FRACTION: (f64, f64) = (0.035, 0.09);

/// Foreground ratio the framing score peaks at.
pub const FRAMING_IDEAL: f64 = 0.12;
/// Acceptable foreground ratio, inclusive.
pub const FRAMING_RANGE: (f64, f64) = (0.03, 0.30);

/// One quality component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScore {
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Whether the component alone is good enough to capture.
    pub acceptable: bool,
}

impl ComponentScore {
    const fn new(score: f64, acceptable: bool) -> Self {
        Self { score, acceptable }
    }
}

/// Quality of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameQualityScore {
    /// Lighting component.
    pub lighting: ComponentScore,
    /// Stability component.
    pub stability: ComponentScore,
    /// Marker distance component.
    pub marker_distance: ComponentScore,
    /// Framing component.
    pub framing: ComponentScore,
    /// Equally weighted mean of the four component scores.
    pub weighted: f64,
    /// `weighted` on a 0..=100 scale, rounded.
    pub composite: u8,
    /// Markers found in the frame.
    pub detected_markers: usize,
}

impl FrameQualityScore {
    /// All four components acceptable and at least one marker visible.
    #[must_use]
    pub const fn is_acceptable(&self) -> bool {
        self.lighting.acceptable
            && self.stability.acceptable
            && self.marker_distance.acceptable
            && self.framing.acceptable
            && self.detected_markers > 0
    }

    /// Operator guidance, one line per check.
    #[must_use]
    pub fn guidance(&self) -> Vec<String> {
        let line = |label: &str, ok: bool, fix: &str| {
            format!("{label}: {}", if ok { "OK" } else { fix })
        };
        vec![
            format!("Good score: {}", self.composite),
            line("Lighting", self.lighting.acceptable, "Fix"),
            line("Stability", self.stability.acceptable, "Hold steady"),
            line("Marker", self.detected_markers > 0, "Show card"),
            line("Distance", self.marker_distance.acceptable, "Adjust"),
            line("Framing", self.framing.acceptable, "Reframe"),
        ]
    }
}

/// Measured inputs for [`score_frame`].
#[derive(Debug, Clone, Copy)]
pub struct QualityInputs<'a> {
    /// Luminance of the frame being scored.
    pub gray: &'a GrayImage,
    /// Luminance of the reference frame for stability.
    pub previous: Option<&'a GrayImage>,
    /// Mean side of the detected markers, in pixels.
    pub mean_marker_side_px: Option<f64>,
    /// Number of detected markers.
    pub detected_markers: usize,
    /// Segmented foreground area over frame area.
    pub mask_ratio: f64,
}

/// Score one frame.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn score_frame(inputs: QualityInputs<'_>) -> FrameQualityScore {
    let diagonal = Dimensions::of(inputs.gray).diagonal();
    let lighting = lighting_score(grayscale::mean_intensity(inputs.gray));
    let stability = stability_score(inputs.previous, inputs.gray);
    let marker_distance = marker_distance_score(inputs.mean_marker_side_px, diagonal);
    let framing = framing_score(inputs.mask_ratio);

    let weighted =
        (lighting.score + stability.score + marker_distance.score + framing.score) / 4.0;
    let composite = (100.0 * weighted).round().clamp(0.0, 100.0) as u8;

    FrameQualityScore {
        lighting,
        stability,
        marker_distance,
        framing,
        weighted,
        composite,
        detected_markers: inputs.detected_markers,
    }
}

/// Lighting from the mean luminance.
#[must_use]
pub fn lighting_score(mean: f64) -> ComponentScore {
    let score = (1.0 - (mean - LIGHTING_IDEAL).abs() / LIGHTING_SPREAD).max(0.0);
    ComponentScore::new(score, (LIGHTING_RANGE.0..=LIGHTING_RANGE.1).contains(&mean))
}

/// Stability from the mean absolute difference to `previous`.
///
/// Without a previous frame, or when its dimensions differ, the score is
/// [`NO_REFERENCE_STABILITY`] and the component is not acceptable.
#[must_use]
pub fn stability_score(previous: Option<&GrayImage>, gray: &GrayImage) -> ComponentScore {
    match previous.and_then(|prev| mean_abs_difference(prev, gray)) {
        Some(motion) => ComponentScore::new(
            (1.0 - motion / MOTION_SCALE).clamp(0.0, 1.0),
            motion < MOTION_LIMIT,
        ),
        None => ComponentScore::new(NO_REFERENCE_STABILITY, false),
    }
}

/// Mean absolute per-pixel difference, or `None` if the sizes differ.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_abs_difference(a: &GrayImage, b: &GrayImage) -> Option<f64> {
    if a.dimensions() != b.dimensions() {
        return None;
    }
    let n = a.as_raw().len();
    if n == 0 {
        return Some(0.0);
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    Some(total as f64 / n as f64)
}

/// Marker distance from the mean marker side and the frame diagonal.
#[must_use]
pub fn marker_distance_score(side_px: Option<f64>, diagonal: f64) -> ComponentScore {
    let Some(side) = side_px.filter(|s| *s > 0.0) else {
        return ComponentScore::new(0.0, false);
    };
    if diagonal <= 0.0 {
        return ComponentScore::new(0.0, false);
    }
    let ideal = MARKER_IDEAL_FRACTION * diagonal;
    let score = (1.0 - (side - ideal).abs() / (MARKER_TOLERANCE_FRACTION * diagonal)).max(0.0);
    let range = (MARKER_RANGE_FRACTION.0 * diagonal)..=(MARKER_RANGE_FRACTION.1 * diagonal);
    ComponentScore::new(score, range.contains(&side))
}

/// Framing from the foreground ratio.
#[must_use]
pub fn framing_score(ratio: f64) -> ComponentScore {
    let score = (1.0 - (ratio - FRAMING_IDEAL).abs() / FRAMING_IDEAL).max(0.0);
    ComponentScore::new(score, (FRAMING_RANGE.0..=FRAMING_RANGE.1).contains(&ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([value]))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn lighting_peaks_at_ideal() {
        let s = lighting_score(140.0);
        assert!(close(s.score, 1.0));
        assert!(s.acceptable);
    }

    #[test]
    fn lighting_too_dark() {
        let s = lighting_score(50.0);
        assert!(close(s.score, 0.0));
        assert!(!s.acceptable);
    }

    #[test]
    fn lighting_range_is_inclusive() {
        assert!(lighting_score(80.0).acceptable);
        assert!(lighting_score(200.0).acceptable);
        assert!(!lighting_score(79.9).acceptable);
    }

    #[test]
    fn stability_without_reference() {
        let s = stability_score(None, &flat(4, 4, 100));
        assert!(close(s.score, 0.5));
        assert!(!s.acceptable);
    }

    #[test]
    fn stability_with_mismatched_reference() {
        let s = stability_score(Some(&flat(5, 4, 100)), &flat(4, 4, 100));
        assert!(close(s.score, 0.5));
        assert!(!s.acceptable);
    }

    #[test]
    fn identical_frames_are_stable() {
        let s = stability_score(Some(&flat(4, 4, 100)), &flat(4, 4, 100));
        assert!(close(s.score, 1.0));
        assert!(s.acceptable);
    }

    #[test]
    fn motion_of_ten_halves_stability() {
        let s = stability_score(Some(&flat(4, 4, 100)), &flat(4, 4, 110));
        assert!(close(s.score, 0.5));
        assert!(!s.acceptable);
    }

    #[test]
    fn motion_limit_is_exclusive() {
        assert!(!stability_score(Some(&flat(2, 2, 0)), &flat(2, 2, 8)).acceptable);
        assert!(stability_score(Some(&flat(2, 2, 0)), &flat(2, 2, 7)).acceptable);
    }

    #[test]
    fn marker_distance_on_500_px_diagonal() {
        let ideal = marker_distance_score(Some(30.0), 500.0);
        assert!(close(ideal.score, 1.0));
        assert!(ideal.acceptable);

        let small = marker_distance_score(Some(20.0), 500.0);
        assert!(close(small.score, 0.5));
        assert!(small.acceptable);

        let tiny = marker_distance_score(Some(10.0), 500.0);
        assert!(close(tiny.score, 0.0));
        assert!(!tiny.acceptable);
    }

    #[test]
    fn missing_marker_scores_zero() {
        assert_eq!(marker_distance_score(None, 500.0), ComponentScore::new(0.0, false));
        assert_eq!(marker_distance_score(Some(0.0), 500.0), ComponentScore::new(0.0, false));
    }

    #[test]
    fn framing_peaks_at_twelve_percent() {
        let s = framing_score(0.12);
        assert!(close(s.score, 1.0));
        assert!(s.acceptable);
        let s = framing_score(0.5);
        assert!(close(s.score, 0.0));
        assert!(!s.acceptable);
        assert!(framing_score(0.03).acceptable);
        assert!(!framing_score(0.01).acceptable);
    }

    #[test]
    fn perfect_frame_scores_100() {
        let gray = flat(400, 300, 140);
        let score = score_frame(QualityInputs {
            gray: &gray,
            previous: Some(&gray),
            mean_marker_side_px: Some(30.0),
            detected_markers: 1,
            mask_ratio: 0.12,
        });
        assert!(close(score.weighted, 1.0));
        assert_eq!(score.composite, 100);
        assert!(score.is_acceptable());
    }

    #[test]
    fn no_marker_blocks_acceptability() {
        let gray = flat(400, 300, 140);
        let score = score_frame(QualityInputs {
            gray: &gray,
            previous: Some(&gray),
            mean_marker_side_px: None,
            detected_markers: 0,
            mask_ratio: 0.12,
        });
        assert_eq!(score.composite, 75);
        assert!(!score.is_acceptable());
    }

    #[test]
    fn first_frame_is_never_acceptable() {
        let gray = flat(400, 300, 140);
        let score = score_frame(QualityInputs {
            gray: &gray,
            previous: None,
            mean_marker_side_px: Some(30.0),
            detected_markers: 1,
            mask_ratio: 0.12,
        });
        assert!(close(score.weighted, 0.875));
        assert_eq!(score.composite, 88);
        assert!(!score.is_acceptable());
    }

    #[test]
    fn guidance_names_each_problem() {
        let gray = flat(400, 300, 30);
        let score = score_frame(QualityInputs {
            gray: &gray,
            previous: None,
            mean_marker_side_px: None,
            detected_markers: 0,
            mask_ratio: 0.0,
        });
        assert_eq!(
            score.guidance(),
            vec![
                "Good score: 13".to_owned(),
                "Lighting: Fix".to_owned(),
                "Stability: Hold steady".to_owned(),
                "Marker: Show card".to_owned(),
                "Distance: Adjust".to_owned(),
                "Framing: Reframe".to_owned(),
            ]
        );
    }
}
