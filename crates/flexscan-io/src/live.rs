//! The live capture session.
//!
//! One synchronous loop per session:
//!
//! 1. read a frame (exhausted source or read failure ends the session),
//! 2. calibrate, segment, and score it against the previous frame,
//! 3. feed the score to the [`CaptureGate`] with the clock's timestamp,
//! 4. when the gate fires, read a burst of frames, score each against
//!    the triggering frame, measure the best one, and persist it.
//!
//! The session owns the source, the gate state, the previous luminance
//! image, and the clock; dropping the session releases the source.

use std::thread;

use flexscan_export::{MeasurementRecord, OverlayStyle, render_analysis};
use flexscan_pipeline::gate::select_best;
use flexscan_pipeline::quality::{self, QualityInputs};
use flexscan_pipeline::segment::segment_checked;
use flexscan_pipeline::types::GrayImage;
use flexscan_pipeline::{
    CaptureConfig, CaptureGate, Clock, Frame, FrameQualityScore, GateDecision, ScaleCalibrator,
    Segmenter, analyze_frame, grayscale,
};
use tracing::{debug, info, instrument, warn};

use crate::IoError;
use crate::persist::{CaptureArtifacts, CaptureSink};
use crate::source::FrameSource;

/// What a finished session did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames read by the main loop (burst frames not included).
    pub frames_processed: u64,
    /// Frames read during bursts.
    pub burst_frames_read: u64,
    /// Every persisted capture, in order.
    pub captures: Vec<CaptureArtifacts>,
}

/// A frame that has been scored.
struct ScoredFrame {
    frame: Frame,
    gray: GrayImage,
    score: FrameQualityScore,
}

/// Drives acquisition, gating, and burst capture.
pub struct LiveSession<S, G, C, K> {
    source: S,
    segmenter: G,
    clock: C,
    sink: K,
    config: CaptureConfig,
    calibrator: ScaleCalibrator,
    gate: CaptureGate,
    style: OverlayStyle,
}

impl<S, G, C, K> LiveSession<S, G, C, K>
where
    S: FrameSource,
    G: Segmenter,
    C: Clock,
    K: CaptureSink,
{
    /// Assemble a session after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Pipeline`] if the configuration is invalid.
    pub fn new(
        source: S,
        segmenter: G,
        clock: C,
        sink: K,
        config: CaptureConfig,
    ) -> Result<Self, IoError> {
        config.validate()?;
        Ok(Self {
            source,
            segmenter,
            clock,
            sink,
            calibrator: ScaleCalibrator::new(config.marker_side_mm),
            gate: CaptureGate::new(config.gate_config()),
            config,
            style: OverlayStyle::default(),
        })
    }

    /// Use `style` for persisted overlays.
    #[must_use]
    pub const fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    /// The capture gate.
    #[must_use]
    pub const fn gate(&self) -> &CaptureGate {
        &self.gate
    }

    /// Run until the source is exhausted, a read fails, or `max_frames`
    /// main-loop frames have been processed.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError`] if a pipeline stage rejects a frame or a
    /// capture cannot be persisted. Read failures are not errors: they
    /// end the session (or truncate a burst).
    #[instrument(skip_all, fields(marker_mm = self.config.marker_side_mm))]
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<SessionSummary, IoError> {
        let mut summary = SessionSummary::default();
        let mut previous: Option<GrayImage> = None;
        info!(
            threshold = self.config.quality_threshold,
            consecutive = self.config.consecutive_frames,
            burst = self.config.burst_frames,
            "live session started"
        );

        while max_frames.is_none_or(|max| summary.frames_processed < max) {
            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("frame source exhausted");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "frame read failed; ending session");
                    break;
                }
            };
            summary.frames_processed += 1;
            let now = self.clock.now();

            let scored = self.score(frame, previous.as_ref())?;
            debug!(
                composite = scored.score.composite,
                counter = self.gate.state().consecutive_good_frames,
                guidance = ?scored.score.guidance(),
                "frame scored"
            );

            if self.gate.observe(&scored.score, now) == GateDecision::Fire {
                info!(at = ?now, "capture triggered");
                self.gate.begin_burst();
                let outcome = self.capture_burst(&scored.gray, &mut summary);
                self.gate.finish_burst(matches!(outcome, Ok(Some(_))));
                if let Some(artifacts) = outcome? {
                    summary.captures.push(artifacts);
                }
            }

            previous = Some(scored.gray);
        }

        info!(
            frames = summary.frames_processed,
            captures = summary.captures.len(),
            "live session finished"
        );
        Ok(summary)
    }

    /// Calibrate, segment, and score one frame.
    fn score(&self, frame: Frame, previous: Option<&GrayImage>) -> Result<ScoredFrame, IoError> {
        let gray = grayscale::luminance(&frame);
        let (scale, _) = self.calibrator.measure(&gray);
        let segmentation = segment_checked(&self.segmenter, &frame)?;
        let score = quality::score_frame(QualityInputs {
            gray: &gray,
            previous,
            mean_marker_side_px: scale.mean_marker_side_px,
            detected_markers: scale.detected_markers,
            mask_ratio: segmentation.mask.foreground_ratio(),
        });
        Ok(ScoredFrame { frame, gray, score })
    }

    /// Read up to `burst_frames` frames, measure the best, and persist it.
    ///
    /// Returns `Ok(None)` when no burst frame could be read.
    fn capture_burst(
        &mut self,
        trigger_gray: &GrayImage,
        summary: &mut SessionSummary,
    ) -> Result<Option<CaptureArtifacts>, IoError> {
        let wanted = self.config.burst_frames;
        let mut burst: Vec<ScoredFrame> = Vec::new();
        for i in 0..wanted {
            if i > 0 {
                thread::sleep(self.config.burst_interval);
            }
            match self.source.read_frame() {
                Ok(Some(frame)) => {
                    summary.burst_frames_read += 1;
                    burst.push(self.score(frame, Some(trigger_gray))?);
                }
                Ok(None) => {
                    warn!(read = burst.len(), wanted, "burst truncated: source exhausted");
                    break;
                }
                Err(err) => {
                    warn!(read = burst.len(), wanted, error = %err, "burst truncated: read failed");
                    break;
                }
            }
        }

        let scores: Vec<FrameQualityScore> = burst.iter().map(|s| s.score).collect();
        let Some(best) = select_best(&scores) else {
            warn!("burst acquired no frames; nothing captured");
            return Ok(None);
        };
        let chosen = burst.swap_remove(best);
        debug!(index = best, weighted = chosen.score.weighted, "best burst frame");

        let analysis = analyze_frame(
            &chosen.frame,
            &self.calibrator,
            &self.segmenter,
            &self.config.uncertainty_config(),
        )?;
        if !analysis.calibration.scale.is_calibrated() {
            warn!("best burst frame has no marker; millimeter values will be 0");
        }
        let record = MeasurementRecord::from_analysis(&analysis);
        let overlay = render_analysis(&analysis, &self.style)?;
        let artifacts = self.sink.persist(&overlay, &record)?;
        Ok(Some(artifacts))
    }
}
