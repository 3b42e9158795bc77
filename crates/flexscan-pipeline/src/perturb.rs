//! Photometric perturbations for the uncertainty ensemble.
//!
//! Each perturbed copy of a frame gets a random global gain and offset
//! (brightness/contrast jitter), independent Gaussian noise on every
//! channel of every pixel, and, with some probability, a mild blur.
//! All randomness comes from the caller's RNG so a seeded RNG reproduces
//! the same copy.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::blur;
use crate::types::Frame;

/// Strength of each perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerturbationConfig {
    /// Standard deviation of the multiplicative gain around 1.
    pub gain_sigma: f64,
    /// Standard deviation of the additive offset, in intensity levels.
    pub offset_sigma: f64,
    /// Standard deviation of per-pixel noise, in intensity levels.
    pub noise_sigma: f64,
    /// Probability of blurring a sample.
    pub blur_probability: f64,
    /// Gaussian sigma used when a sample is blurred.
    pub blur_sigma: f32,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            gain_sigma: 0.08,
            offset_sigma: 8.0,
            noise_sigma: 4.0,
            blur_probability: 0.3,
            blur_sigma: 0.8,
        }
    }
}

/// Draw from the standard normal distribution (Box-Muller transform).
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - [0, 1) keeps the logarithm's argument in (0, 1].
    let u1: f64 = 1.0 - rng.gen_range(0.0..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Produce one perturbed copy of `frame`.
#[must_use = "returns the perturbed frame"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn perturb_frame<R: Rng + ?Sized>(
    frame: &Frame,
    config: &PerturbationConfig,
    rng: &mut R,
) -> Frame {
    let gain = config.gain_sigma.mul_add(standard_normal(rng), 1.0);
    let offset = config.offset_sigma * standard_normal(rng);

    let mut out = frame.clone();
    for p in out.pixels_mut() {
        for c in &mut p.0 {
            let noise = if config.noise_sigma > 0.0 {
                config.noise_sigma * standard_normal(rng)
            } else {
                0.0
            };
            let value = f64::from(*c).mul_add(gain, offset + noise);
            *c = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    if config.blur_probability > 0.0 && rng.gen_bool(config.blur_probability.min(1.0)) {
        out = blur::gaussian_blur_rgb(&out, config.blur_sigma);
    }
    out
}
