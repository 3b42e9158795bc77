//! Ensemble uncertainty for capture metrics.
//!
//! The source frame is perturbed `samples` times; every copy is
//! segmented and measured again while the original calibration is held
//! fixed. Each metric is then summarized as mean, sample standard
//! deviation, and a 95% interval half-width (`1.96 * std`).
//!
//! Sample `i` uses its own `StdRng` seeded from the base seed and `i`, so
//! results do not depend on evaluation order and any single sample can
//! be regenerated on its own.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibrate::ScaleCalibration;
use crate::metrics::{self, Metrics};
use crate::perturb::{self, PerturbationConfig};
use crate::segment::{self, Segmenter};
use crate::types::{Frame, PipelineError};

/// Largest accepted ensemble size.
pub const MAX_SAMPLES: u32 = 32;

/// z-score of a two-sided 95% normal interval.
pub const Z_95: f64 = 1.96;

/// Golden-ratio increment used to spread per-sample seeds.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Ensemble parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// Number of perturbed samples; 0 disables the estimate.
    pub samples: u32,
    /// Base seed.
    pub seed: u64,
    /// Perturbation strengths.
    pub perturbation: PerturbationConfig,
}

impl UncertaintyConfig {
    /// Check the sample count.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `samples` exceeds
    /// [`MAX_SAMPLES`].
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.samples > MAX_SAMPLES {
            return Err(PipelineError::InvalidConfig(format!(
                "uncertainty samples must be at most {MAX_SAMPLES}, got {}",
                self.samples
            )));
        }
        Ok(())
    }
}

/// Summary of one metric over the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricEstimate {
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (N - 1 denominator, 0 for one sample).
    pub std: f64,
    /// 95% interval half-width.
    pub ci95: f64,
}

/// Per-metric ensemble summaries, keyed like [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsUncertainty {
    /// Summary of [`Metrics::arc_length_mm`].
    pub arc_length_mm: MetricEstimate,
    /// Summary of [`Metrics::max_curvature_deg`].
    pub max_curvature_deg: MetricEstimate,
    /// Summary of [`Metrics::straight_length_mm`].
    #[serde(rename = "length_mm")]
    pub straight_length_mm: MetricEstimate,
    /// Summary of [`Metrics::hinge_location_ratio`].
    pub hinge_location_ratio: MetricEstimate,
}

impl MetricsUncertainty {
    /// Summarize a non-empty set of per-sample metrics.
    #[must_use]
    pub fn from_samples(samples: &[Metrics]) -> Self {
        let field = |f: fn(&Metrics) -> f64| summarize(&samples.iter().map(f).collect::<Vec<_>>());
        Self {
            arc_length_mm: field(|m| m.arc_length_mm),
            max_curvature_deg: field(|m| m.max_curvature_deg),
            straight_length_mm: field(|m| m.straight_length_mm),
            hinge_location_ratio: field(|m| m.hinge_location_ratio),
        }
    }
}

/// Mean, sample standard deviation, and 95% half-width of `values`.
///
/// An empty slice summarizes to zeros; a single value has zero spread.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn summarize(values: &[f64]) -> MetricEstimate {
    let n = values.len();
    if n == 0 {
        return MetricEstimate::default();
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let std = if n > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    MetricEstimate {
        mean,
        std,
        ci95: Z_95 * std,
    }
}

/// Seed for ensemble sample `index`.
#[must_use]
pub const fn sample_seed(base: u64, index: u32) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(SEED_STRIDE))
}

/// Re-measure perturbed copies of `frame` and summarize the spread.
///
/// Returns `Ok(None)` when `config.samples` is 0.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for too many samples and
/// [`PipelineError::DimensionMismatch`] if the segmenter returns a mask
/// of the wrong size.
pub fn estimate_uncertainty<S: Segmenter + ?Sized>(
    frame: &Frame,
    scale: &ScaleCalibration,
    segmenter: &S,
    config: &UncertaintyConfig,
) -> Result<Option<MetricsUncertainty>, PipelineError> {
    config.validate()?;
    if config.samples == 0 {
        return Ok(None);
    }

    let mut samples = Vec::with_capacity(config.samples as usize);
    for index in 0..config.samples {
        let mut rng = StdRng::seed_from_u64(sample_seed(config.seed, index));
        let perturbed = perturb::perturb_frame(frame, &config.perturbation, &mut rng);
        let segmentation = segment::segment_checked(segmenter, &perturbed)?;
        samples.push(metrics::measure_mask(&segmentation.mask, scale).metrics);
    }

    let estimate = MetricsUncertainty::from_samples(&samples);
    debug!(
        samples = config.samples,
        arc_length_std = estimate.arc_length_mm.std,
        curvature_std = estimate.max_curvature_deg.std,
        "estimated uncertainty"
    );
    Ok(Some(estimate))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grayscale;
    use crate::segment::Segmentation;
    use crate::types::BinaryMask;

    /// Bright frame with a dark, slightly bent band.
    fn band_frame() -> Frame {
        Frame::from_fn(80, 60, |x, y| {
            let center = 30 + x / 8;
            if y.abs_diff(center) <= 2 && (10..70).contains(&x) {
                image::Rgb([40, 40, 40])
            } else {
                image::Rgb([210, 210, 210])
            }
        })
    }

    /// Segment the dark band by luminance.
    fn dark_segmenter(frame: &Frame) -> Segmentation {
        let gray = grayscale::luminance(frame);
        let mask = BinaryMask::from_fn(frame.width(), frame.height(), |x, y| {
            gray.get_pixel(x, y).0[0] < 125
        });
        Segmentation::with_tint(frame, mask)
    }

    fn scale() -> ScaleCalibration {
        ScaleCalibration {
            pixels_per_mm: Some(4.0),
            mean_marker_side_px: Some(80.0),
            detected_markers: 1,
        }
    }

    #[test]
    fn summarize_three_values() {
        let estimate = summarize(&[1.0, 2.0, 3.0]);
        assert!((estimate.mean - 2.0).abs() < 1e-12);
        assert!((estimate.std - 1.0).abs() < 1e-12);
        assert!((estimate.ci95 - 1.96).abs() < 1e-12);
    }

    #[test]
    fn summarize_single_value_has_no_spread() {
        let estimate = summarize(&[5.0]);
        assert!((estimate.mean - 5.0).abs() < f64::EPSILON);
        assert!(estimate.std.abs() < f64::EPSILON);
        assert!(estimate.ci95.abs() < f64::EPSILON);
    }

    #[test]
    fn summarize_empty_is_zero() {
        assert_eq!(summarize(&[]), MetricEstimate::default());
    }

    #[test]
    fn zero_samples_disables_estimate() {
        let result = estimate_uncertainty(
            &band_frame(),
            &scale(),
            &dark_segmenter,
            &UncertaintyConfig::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn one_sample_reports_zero_spread() {
        let config = UncertaintyConfig {
            samples: 1,
            seed: 3,
            ..UncertaintyConfig::default()
        };
        let estimate = estimate_uncertainty(&band_frame(), &scale(), &dark_segmenter, &config)
            .unwrap()
            .unwrap();
        for e in [
            estimate.arc_length_mm,
            estimate.max_curvature_deg,
            estimate.straight_length_mm,
            estimate.hinge_location_ratio,
        ] {
            assert!(e.std.abs() < f64::EPSILON);
            assert!(e.ci95.abs() < f64::EPSILON);
        }
        assert!(estimate.arc_length_mm.mean > 0.0);
    }

    #[test]
    fn same_seed_reproduces_estimate() {
        let config = UncertaintyConfig {
            samples: 4,
            seed: 99,
            ..UncertaintyConfig::default()
        };
        let a = estimate_uncertainty(&band_frame(), &scale(), &dark_segmenter, &config).unwrap();
        let b = estimate_uncertainty(&band_frame(), &scale(), &dark_segmenter, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn default_segmenter_works_as_ensemble_member() {
        let config = UncertaintyConfig {
            samples: 2,
            ..UncertaintyConfig::default()
        };
        let result = estimate_uncertainty(
            &band_frame(),
            &scale(),
            &crate::segment::SegmenterKind::default(),
            &config,
        );
        assert!(result.unwrap().is_some());
    }

    #[test]
    fn too_many_samples_is_rejected() {
        let config = UncertaintyConfig {
            samples: MAX_SAMPLES + 1,
            ..UncertaintyConfig::default()
        };
        let result = estimate_uncertainty(&band_frame(), &scale(), &dark_segmenter, &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn sample_seeds_differ_per_index() {
        assert_eq!(sample_seed(5, 0), 5);
        assert_ne!(sample_seed(5, 1), sample_seed(5, 2));
    }

    #[test]
    fn serializes_with_record_field_names() {
        let json = serde_json::to_value(MetricsUncertainty::default()).unwrap();
        assert!(json.get("length_mm").is_some());
        assert!(json["arc_length_mm"].get("ci95").is_some());
    }
}
