//! The JSON measurement record written next to every capture.
//!
//! ```json
//! {
//!   "pixels_per_mm": 2.95,
//!   "detected_markers": 1,
//!   "metrics": {
//!     "arc_length_mm": 61.2,
//!     "max_curvature_deg": 34.8,
//!     "length_mm": 55.0,
//!     "hinge_location_ratio": 0.41
//!   }
//! }
//! ```
//!
//! `pixels_per_mm` is `null` when no marker was found, and the
//! `uncertainty` object (per metric `mean`, `std`, `ci95`) is present
//! only when an ensemble was run.

use flexscan_pipeline::{FrameAnalysis, Metrics, MetricsUncertainty, ScaleCalibration};
use serde::{Deserialize, Serialize};

use crate::ExportError;

/// One persisted measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Scale used for the millimeter fields.
    pub pixels_per_mm: Option<f64>,
    /// Markers found in the measured frame.
    pub detected_markers: usize,
    /// The measurements.
    pub metrics: Metrics,
    /// Ensemble spread of the measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncertainty: Option<MetricsUncertainty>,
}

impl MeasurementRecord {
    /// Assemble a record from its parts.
    #[must_use]
    pub const fn new(
        scale: &ScaleCalibration,
        metrics: Metrics,
        uncertainty: Option<MetricsUncertainty>,
    ) -> Self {
        Self {
            pixels_per_mm: scale.pixels_per_mm,
            detected_markers: scale.detected_markers,
            metrics,
            uncertainty,
        }
    }

    /// The record for a full frame analysis.
    #[must_use]
    pub const fn from_analysis(analysis: &FrameAnalysis) -> Self {
        Self::new(
            &analysis.calibration.scale,
            analysis.measurement.metrics,
            analysis.uncertainty,
        )
    }

    /// Pretty-printed JSON (two-space indent).
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if serialization fails, which only
    /// happens for non-finite numbers.
    pub fn to_json_pretty(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a record.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Json`] if `json` is not a valid record.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(json)?)
    }
}
