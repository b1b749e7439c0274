//! Tachometer simulator
//!
//! Integrates applied wheel rotation into whole-degree tacho counts with
//! configurable slip. Fractional degrees carry over between steps.

use super::config::EncoderConfig;
use super::noise::NoiseGenerator;
use crate::core::types::TachoCounts;

pub struct EncoderSimulator {
    config: EncoderConfig,
    noise: NoiseGenerator,
    left_accumulator: f64,
    right_accumulator: f64,
    counts: TachoCounts,
}

impl EncoderSimulator {
    pub fn new(config: &EncoderConfig, noise: NoiseGenerator) -> Self {
        Self {
            config: config.clone(),
            noise,
            left_accumulator: 0.0,
            right_accumulator: 0.0,
            counts: TachoCounts::default(),
        }
    }

    /// Record wheel rotation (deg) and return the updated counts.
    pub fn update(&mut self, left_deg: f64, right_deg: f64) -> TachoCounts {
        let left_slip = 1.0 + self.config.slip_bias + self.noise.gaussian(self.config.slip_stddev);
        let right_slip =
            1.0 + self.config.slip_bias + self.noise.gaussian(self.config.slip_stddev);

        self.left_accumulator += left_deg * left_slip;
        self.right_accumulator += right_deg * right_slip;

        let left_whole = whole_degrees(self.left_accumulator);
        let right_whole = whole_degrees(self.right_accumulator);
        self.left_accumulator -= left_whole;
        self.right_accumulator -= right_whole;

        self.counts.left += left_whole as i64;
        self.counts.right += right_whole as i64;
        self.counts
    }

    #[inline]
    pub fn counts(&self) -> TachoCounts {
        self.counts
    }
}

/// Tolerance for float error when counting whole degrees
const COUNT_EPSILON: f64 = 1e-9;

/// Whole degrees in `accumulated`, truncated toward zero.
///
/// Summing fractional steps lands a hair short of the exact count
/// (0.9 * 200 gives 179.999...), so values within `COUNT_EPSILON` of the
/// next whole degree count as reaching it.
fn whole_degrees(accumulated: f64) -> f64 {
    (accumulated + COUNT_EPSILON.copysign(accumulated)).trunc()
}
