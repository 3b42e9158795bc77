//! One-shot analysis of an image file.

use std::fs;
use std::path::Path;

use flexscan_export::{MeasurementRecord, OverlayStyle, render_analysis};
use flexscan_pipeline::{
    Frame, FrameAnalysis, PipelineError, ScaleCalibrator, Segmenter, UncertaintyConfig,
    analyze_frame, grayscale,
};
use tracing::{info, instrument, warn};

use crate::IoError;

/// Settings for [`analyze_image`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzeOptions {
    /// Printed marker side length in millimeters.
    pub marker_side_mm: f64,
    /// Ensemble settings; zero samples skips the estimate.
    pub uncertainty: UncertaintyConfig,
    /// Overlay colors.
    pub style: OverlayStyle,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            marker_side_mm: 20.0,
            uncertainty: UncertaintyConfig::default(),
            style: OverlayStyle::default(),
        }
    }
}

/// Result of [`analyze_image`].
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    /// The record to persist or print.
    pub record: MeasurementRecord,
    /// The annotated image.
    pub overlay: Frame,
    /// Full pipeline output.
    pub analysis: FrameAnalysis,
}

/// Load the image at `path` and measure it.
///
/// A missing marker is logged and reported through the record
/// (`pixels_per_mm` absent, millimeter fields 0); it is not an error.
///
/// # Errors
///
/// Returns [`IoError::Read`] or [`IoError::Decode`] if the image cannot
/// be loaded, [`IoError::Pipeline`] for invalid options, and
/// [`IoError::Export`] if the overlay cannot be rendered.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn analyze_image<S: Segmenter + ?Sized>(
    path: &Path,
    options: &AnalyzeOptions,
    segmenter: &S,
) -> Result<ImageAnalysis, IoError> {
    if !(options.marker_side_mm.is_finite() && options.marker_side_mm > 0.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "marker side must be a positive number of millimeters, got {}",
            options.marker_side_mm
        ))
        .into());
    }

    let bytes = fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let frame = grayscale::decode_frame(&bytes).map_err(|source| IoError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let calibrator = ScaleCalibrator::new(options.marker_side_mm);
    let analysis = analyze_frame(&frame, &calibrator, segmenter, &options.uncertainty)?;
    if !analysis.calibration.scale.is_calibrated() {
        warn!("no calibration marker found; millimeter values will be 0");
    }

    let record = MeasurementRecord::from_analysis(&analysis);
    let overlay = render_analysis(&analysis, &options.style)?;
    info!(
        pixels_per_mm = ?record.pixels_per_mm,
        arc_length_mm = record.metrics.arc_length_mm,
        max_curvature_deg = record.metrics.max_curvature_deg,
        "analyzed image"
    );
    Ok(ImageAnalysis {
        record,
        overlay,
        analysis,
    })
}
