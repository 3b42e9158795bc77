//! Auto-capture gate.
//!
//! The gate counts consecutive good frames and fires once the count
//! reaches the configured requirement, unless a capture succeeded less
//! than the cooldown ago. The session drives it frame by frame with a
//! monotonic timestamp from a [`Clock`], runs the burst between
//! [`CaptureGate::begin_burst`] and [`CaptureGate::finish_burst`], and
//! reports whether anything was captured.

use std::cell::Cell;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::quality::FrameQualityScore;

/// Gate parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Minimum composite score (0..=100) for a good frame.
    pub quality_threshold: u8,
    /// Consecutive good frames required to fire.
    pub consecutive_frames: u32,
    /// Minimum time between successful captures.
    pub cooldown: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 85,
            consecutive_frames: 10,
            cooldown: Duration::from_secs(2),
        }
    }
}

/// Where the gate is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GatePhase {
    /// Counting good frames toward the requirement.
    #[default]
    Waiting,
    /// Requirement reached; the caller should capture a burst.
    Armed,
    /// A burst is in progress.
    Capturing,
    /// A recent capture suppresses re-triggering.
    Cooldown,
}

/// Counter and timestamp owned by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureGateState {
    /// Good frames seen in a row.
    pub consecutive_good_frames: u32,
    /// Trigger time of the last successful capture.
    pub last_capture: Option<Duration>,
}

/// Outcome of observing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Keep streaming.
    Hold,
    /// Capture a burst now.
    Fire,
}

/// The capture state machine.
#[derive(Debug, Clone)]
pub struct CaptureGate {
    config: GateConfig,
    state: CaptureGateState,
    phase: GatePhase,
    pending_trigger: Option<Duration>,
}

impl CaptureGate {
    /// Create a gate in [`GatePhase::Waiting`] with no capture history.
    #[must_use]
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: CaptureGateState::default(),
            phase: GatePhase::Waiting,
            pending_trigger: None,
        }
    }

    /// The gate parameters.
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Current counter and last capture time.
    #[must_use]
    pub const fn state(&self) -> &CaptureGateState {
        &self.state
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Whether `score` counts toward the requirement.
    #[must_use]
    pub const fn is_good(&self, score: &FrameQualityScore) -> bool {
        score.composite >= self.config.quality_threshold && score.is_acceptable()
    }

    fn in_cooldown(&self, now: Duration) -> bool {
        self.state
            .last_capture
            .is_some_and(|last| now.saturating_sub(last) < self.config.cooldown)
    }

    /// Feed one frame's score, taken at `now`.
    pub fn observe(&mut self, score: &FrameQualityScore, now: Duration) -> GateDecision {
        if !self.is_good(score) {
            self.state.consecutive_good_frames = 0;
            self.phase = GatePhase::Waiting;
            return GateDecision::Hold;
        }

        self.state.consecutive_good_frames = self.state.consecutive_good_frames.saturating_add(1);
        let cooling = self.in_cooldown(now);

        if self.state.consecutive_good_frames < self.config.consecutive_frames {
            self.phase = if cooling {
                GatePhase::Cooldown
            } else {
                GatePhase::Waiting
            };
            return GateDecision::Hold;
        }
        if cooling {
            self.phase = GatePhase::Cooldown;
            return GateDecision::Hold;
        }

        self.phase = GatePhase::Armed;
        self.pending_trigger = Some(now);
        GateDecision::Fire
    }

    /// Enter [`GatePhase::Capturing`] after a [`GateDecision::Fire`].
    pub fn begin_burst(&mut self) {
        if self.phase == GatePhase::Armed {
            self.phase = GatePhase::Capturing;
        }
    }

    /// Close the burst.
    ///
    /// On success the trigger time is recorded and the gate cools down;
    /// an empty burst leaves the history untouched and returns to
    /// [`GatePhase::Waiting`]. Either way the counter restarts.
    pub fn finish_burst(&mut self, captured: bool) {
        let trigger = self.pending_trigger.take();
        self.state.consecutive_good_frames = 0;
        match trigger {
            Some(at) if captured => {
                self.state.last_capture = Some(at);
                self.phase = GatePhase::Cooldown;
            }
            _ => self.phase = GatePhase::Waiting,
        }
    }
}

/// Source of monotonic timestamps for the gate.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(Cell<Duration>);

impl ManualClock {
    /// Start at `start`.
    #[must_use]
    pub const fn new(start: Duration) -> Self {
        Self(Cell::new(start))
    }

    /// Move forward by `step`.
    pub fn advance(&self, step: Duration) {
        self.0.set(self.0.get().saturating_add(step));
    }

    /// Jump to `at`.
    pub fn set(&self, at: Duration) {
        self.0.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Index of the burst frame with the highest weighted score, first on
/// ties. `None` for an empty burst.
#[must_use]
pub fn select_best(scores: &[FrameQualityScore]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        if best.is_none_or(|(_, w)| score.weighted > w) {
            best = Some((i, score.weighted));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::quality::ComponentScore;

    const OK: ComponentScore = ComponentScore {
        score: 1.0,
        acceptable: true,
    };

    fn good() -> FrameQualityScore {
        FrameQualityScore {
            lighting: OK,
            stability: OK,
            marker_distance: OK,
            framing: OK,
            weighted: 1.0,
            composite: 100,
            detected_markers: 1,
        }
    }

    fn bad() -> FrameQualityScore {
        FrameQualityScore {
            detected_markers: 0,
            ..good()
        }
    }

    fn weighted(w: f64) -> FrameQualityScore {
        FrameQualityScore {
            weighted: w,
            ..good()
        }
    }

    fn gate(consecutive_frames: u32) -> CaptureGate {
        CaptureGate::new(GateConfig {
            quality_threshold: 85,
            consecutive_frames,
            cooldown: Duration::from_secs(2),
        })
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_exactly_once_when_requirement_is_met() {
        let mut g = gate(5);
        let decisions: Vec<_> = (0..5).map(|i| g.observe(&good(), ms(i * 33))).collect();
        assert_eq!(decisions.iter().filter(|d| **d == GateDecision::Fire).count(), 1);
        assert_eq!(decisions[4], GateDecision::Fire);
        assert_eq!(g.phase(), GatePhase::Armed);
    }

    #[test]
    fn bad_frame_resets_the_counter() {
        let mut g = gate(3);
        g.observe(&good(), ms(0));
        g.observe(&good(), ms(33));
        assert_eq!(g.observe(&bad(), ms(66)), GateDecision::Hold);
        assert_eq!(g.state().consecutive_good_frames, 0);
        assert_eq!(g.phase(), GatePhase::Waiting);
        g.observe(&good(), ms(99));
        g.observe(&good(), ms(132));
        assert_eq!(g.observe(&good(), ms(165)), GateDecision::Fire);
    }

    #[test]
    fn composite_below_threshold_is_not_good() {
        let g = gate(1);
        let low = FrameQualityScore {
            composite: 84,
            ..good()
        };
        assert!(!g.is_good(&low));
        assert!(g.is_good(&good()));
    }

    #[test]
    fn successful_burst_records_trigger_and_cools_down() {
        let mut g = gate(2);
        g.observe(&good(), ms(0));
        assert_eq!(g.observe(&good(), ms(100)), GateDecision::Fire);
        g.begin_burst();
        assert_eq!(g.phase(), GatePhase::Capturing);
        g.finish_burst(true);

        assert_eq!(g.phase(), GatePhase::Cooldown);
        assert_eq!(g.state().last_capture, Some(ms(100)));
        assert_eq!(g.state().consecutive_good_frames, 0);
    }

    #[test]
    fn cooldown_suppresses_second_trigger() {
        let mut g = gate(2);
        g.observe(&good(), ms(0));
        g.observe(&good(), ms(100));
        g.begin_burst();
        g.finish_burst(true);

        g.observe(&good(), ms(500));
        assert_eq!(g.observe(&good(), ms(600)), GateDecision::Hold);
        assert_eq!(g.phase(), GatePhase::Cooldown);
        assert_eq!(g.observe(&good(), ms(2099)), GateDecision::Hold);
        assert_eq!(g.observe(&good(), ms(2100)), GateDecision::Fire);
    }

    #[test]
    fn empty_burst_records_nothing() {
        let mut g = gate(1);
        assert_eq!(g.observe(&good(), ms(0)), GateDecision::Fire);
        g.begin_burst();
        g.finish_burst(false);

        assert_eq!(g.phase(), GatePhase::Waiting);
        assert_eq!(g.state().last_capture, None);
        assert_eq!(g.observe(&good(), ms(10)), GateDecision::Fire);
    }

    #[test]
    fn first_capture_has_no_cooldown() {
        let mut g = gate(1);
        assert_eq!(g.observe(&good(), Duration::ZERO), GateDecision::Fire);
    }

    #[test]
    fn select_best_prefers_first_maximum() {
        let scores = [weighted(0.7), weighted(0.9), weighted(0.9), weighted(0.2)];
        assert_eq!(select_best(&scores), Some(1));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let clock = ManualClock::new(ms(5));
        clock.advance(ms(10));
        assert_eq!(clock.now(), ms(15));
        clock.set(ms(1));
        assert_eq!((&clock).now(), ms(1));
    }
}
