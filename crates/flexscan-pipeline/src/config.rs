//! Session configuration for the live capture loop.
//!
//! [`CaptureConfig`] gathers every operator-facing knob in one
//! serde-friendly struct so it can be built from CLI flags or parsed
//! from JSON. Durations are serialized as fractional seconds.
//!
//! Values are validated once, up front, by [`CaptureConfig::validate`];
//! the stages that consume them assume they are in range.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::gate::GateConfig;
use crate::types::PipelineError;
use crate::uncertainty::UncertaintyConfig;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Configuration for a live capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Printed side length of the calibration marker in millimeters.
    pub marker_side_mm: f64,

    /// Minimum composite quality score (0-100) a frame needs to count
    /// toward the trigger.
    pub quality_threshold: u8,

    /// Number of consecutive acceptable frames required before a burst
    /// is triggered.
    pub consecutive_frames: u32,

    /// Number of frames acquired per burst.
    pub burst_frames: u32,

    /// Camera device index used when no frame directory is given.
    pub camera_index: u32,

    /// Perturbed re-measurements per capture (0 disables uncertainty).
    pub uncertainty_samples: u32,

    /// Base seed for the uncertainty ensemble.
    pub uncertainty_seed: u64,

    /// Minimum time between two successful captures.
    #[serde(with = "duration_serde")]
    pub cooldown: Duration,

    /// Pause between two burst frame reads.
    #[serde(with = "duration_serde")]
    pub burst_interval: Duration,
}

impl CaptureConfig {
    /// Default marker side length (mm).
    pub const DEFAULT_MARKER_SIDE_MM: f64 = 20.0;
    /// Default composite threshold.
    pub const DEFAULT_QUALITY_THRESHOLD: u8 = 85;
    /// Default consecutive-frame requirement.
    pub const DEFAULT_CONSECUTIVE_FRAMES: u32 = 10;
    /// Default burst size.
    pub const DEFAULT_BURST_FRAMES: u32 = 6;
    /// Default re-trigger cooldown.
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);
    /// Default pause between burst reads.
    pub const DEFAULT_BURST_INTERVAL: Duration = Duration::from_millis(30);

    /// Allowed burst sizes.
    pub const BURST_FRAMES_RANGE: std::ops::RangeInclusive<u32> = 3..=12;
    /// Allowed consecutive-frame requirements.
    pub const CONSECUTIVE_FRAMES_RANGE: std::ops::RangeInclusive<u32> = 1..=120;

    /// Check every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first field
    /// that is out of range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.marker_side_mm.is_finite() && self.marker_side_mm > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "marker_side_mm must be a positive number, got {}",
                self.marker_side_mm
            )));
        }
        if self.quality_threshold > 100 {
            return Err(PipelineError::InvalidConfig(format!(
                "quality_threshold must be within 0..=100, got {}",
                self.quality_threshold
            )));
        }
        if !Self::CONSECUTIVE_FRAMES_RANGE.contains(&self.consecutive_frames) {
            return Err(PipelineError::InvalidConfig(format!(
                "consecutive_frames must be within {:?}, got {}",
                Self::CONSECUTIVE_FRAMES_RANGE,
                self.consecutive_frames
            )));
        }
        if !Self::BURST_FRAMES_RANGE.contains(&self.burst_frames) {
            return Err(PipelineError::InvalidConfig(format!(
                "burst_frames must be within {:?}, got {}",
                Self::BURST_FRAMES_RANGE,
                self.burst_frames
            )));
        }
        if self.cooldown.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "cooldown must be greater than zero".to_owned(),
            ));
        }
        self.uncertainty_config().validate()
    }

    /// The gate parameters derived from this configuration.
    #[must_use]
    pub const fn gate_config(&self) -> GateConfig {
        GateConfig {
            quality_threshold: self.quality_threshold,
            consecutive_frames: self.consecutive_frames,
            cooldown: self.cooldown,
        }
    }

    /// The uncertainty parameters derived from this configuration.
    #[must_use]
    pub fn uncertainty_config(&self) -> UncertaintyConfig {
        UncertaintyConfig {
            samples: self.uncertainty_samples,
            seed: self.uncertainty_seed,
            ..UncertaintyConfig::default()
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            marker_side_mm: Self::DEFAULT_MARKER_SIDE_MM,
            quality_threshold: Self::DEFAULT_QUALITY_THRESHOLD,
            consecutive_frames: Self::DEFAULT_CONSECUTIVE_FRAMES,
            burst_frames: Self::DEFAULT_BURST_FRAMES,
            camera_index: 0,
            uncertainty_samples: 0,
            uncertainty_seed: 0,
            cooldown: Self::DEFAULT_COOLDOWN,
            burst_interval: Self::DEFAULT_BURST_INTERVAL,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CaptureConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_marker_size() {
        for mm in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = CaptureConfig {
                marker_side_mm: mm,
                ..CaptureConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfig(_))),
                "marker_side_mm = {mm} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_threshold_above_100() {
        let config = CaptureConfig {
            quality_threshold: 101,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn burst_size_bounds_are_inclusive() {
        for (burst, ok) in [(2, false), (3, true), (12, true), (13, false)] {
            let config = CaptureConfig {
                burst_frames: burst,
                ..CaptureConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "burst_frames = {burst}");
        }
    }

    #[test]
    fn rejects_zero_consecutive_frames() {
        let config = CaptureConfig {
            consecutive_frames: 0,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_too_many_uncertainty_samples() {
        let config = CaptureConfig {
            uncertainty_samples: 33,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"burst_frames": 4, "cooldown": 0.5}"#).unwrap();
        assert_eq!(config.burst_frames, 4);
        assert_eq!(config.cooldown, Duration::from_millis(500));
        assert_eq!(config.quality_threshold, CaptureConfig::DEFAULT_QUALITY_THRESHOLD);
    }

    #[test]
    fn negative_duration_is_a_parse_error() {
        let result: Result<CaptureConfig, _> = serde_json::from_str(r#"{"cooldown": -1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn gate_config_mirrors_fields() {
        let config = CaptureConfig {
            quality_threshold: 70,
            consecutive_frames: 4,
            ..CaptureConfig::default()
        };
        let gate = config.gate_config();
        assert_eq!(gate.quality_threshold, 70);
        assert_eq!(gate.consecutive_frames, 4);
        assert_eq!(gate.cooldown, CaptureConfig::DEFAULT_COOLDOWN);
    }
}
