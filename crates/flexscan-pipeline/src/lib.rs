//! flexscan-pipeline: Pure measurement pipeline (sans-IO).
//!
//! Turns a color frame containing a calibration marker and a segmented
//! subject into physical measurements:
//! marker detection -> scale calibration -> segmentation ->
//! skeletonization -> centerline tracing -> curvature analysis ->
//! millimeter metrics -> optional ensemble uncertainty.
//!
//! The same crate scores live frames for capture quality and holds the
//! auto-capture gate. It performs **no I/O**: frames come in as
//! in-memory images, time comes in through a [`Clock`], and everything
//! that touches cameras or the filesystem lives in `flexscan-io`.

pub mod blur;
pub mod calibrate;
pub mod centerline;
pub mod config;
pub mod curvature;
pub mod gate;
pub mod grayscale;
pub mod marker;
pub mod metrics;
pub mod perturb;
pub mod quality;
pub mod segment;
pub mod simplify;
pub mod skeleton;
pub mod types;
pub mod uncertainty;

pub use calibrate::{Calibration, ScaleCalibration, ScaleCalibrator};
pub use config::CaptureConfig;
pub use curvature::CurvatureAnalysis;
pub use gate::{CaptureGate, CaptureGateState, Clock, GateConfig, GateDecision, GatePhase};
pub use marker::{DetectedMarker, MarkerDetector, MarkerDictionary};
pub use metrics::{Measurement, Metrics};
pub use quality::{FrameQualityScore, QualityInputs};
pub use segment::{Segmentation, Segmenter, SegmenterKind};
pub use types::{
    BinaryMask, CenterlinePath, Dimensions, Frame, PipelineError, PixelCoord, Point, Skeleton,
};
pub use uncertainty::{MetricEstimate, MetricsUncertainty, UncertaintyConfig};

/// Everything produced while analyzing one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Marker calibration and the marker-annotated frame.
    pub calibration: Calibration,
    /// Segmentation mask and its overlay.
    pub segmentation: Segmentation,
    /// Skeleton, centerline, and metrics.
    pub measurement: Measurement,
    /// Ensemble spread of the metrics, when requested.
    pub uncertainty: Option<MetricsUncertainty>,
}

/// Run the full measurement pipeline on one frame.
///
/// # Pipeline steps
///
/// 1. Detect markers and derive pixels per millimeter
/// 2. Segment the subject (pluggable strategy)
/// 3. Skeletonize the mask
/// 4. Trace the centerline from base to tip
/// 5. Analyze arc length, chord length, and curvature
/// 6. Convert lengths to millimeters
/// 7. Optionally re-measure perturbed copies for uncertainty
///
/// A frame without markers is not an error: lengths come back as 0 and
/// the shape metrics are still computed.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if the frame has no pixels.
/// Returns [`PipelineError::DimensionMismatch`] if the segmenter returns
/// a mask of the wrong size.
/// Returns [`PipelineError::InvalidConfig`] if the uncertainty settings
/// are out of range.
pub fn analyze_frame<S: Segmenter + ?Sized>(
    frame: &Frame,
    calibrator: &ScaleCalibrator,
    segmenter: &S,
    uncertainty: &UncertaintyConfig,
) -> Result<FrameAnalysis, PipelineError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(PipelineError::EmptyInput);
    }
    uncertainty.validate()?;

    // 1. Scale calibration.
    let calibration = calibrator.calibrate(frame);

    // 2. Segmentation.
    let segmentation = segment::segment_checked(segmenter, frame)?;

    // 3-6. Skeleton, centerline, curvature, millimeter metrics.
    let measurement = metrics::measure_mask(&segmentation.mask, &calibration.scale);

    // 7. Optional ensemble uncertainty.
    let uncertainty =
        uncertainty::estimate_uncertainty(frame, &calibration.scale, segmenter, uncertainty)?;

    Ok(FrameAnalysis {
        calibration,
        segmentation,
        measurement,
        uncertainty,
    })
}
