//! Seeded noise source for the simulated sensors

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Gaussian and uniform noise with optional deterministic seeding
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Seed 0 draws from OS entropy; any other seed is reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Zero-mean Gaussian sample scaled by `stddev`
    #[inline]
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    /// Uniform sample in [0, 1)
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        Uniform::new(0.0f64, 1.0).sample(&mut self.rng)
    }

    /// True with the given probability
    #[inline]
    pub fn chance(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.uniform() < probability
    }

    /// Derive an independent generator for another sensor.
    pub fn fork(&mut self) -> Self {
        let seed: u64 = self.rng.next_u64();
        Self::new(seed.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = NoiseGenerator::new(7);
        let mut b = NoiseGenerator::new(7);
        for _ in 0..50 {
            assert_eq!(a.gaussian(2.0), b.gaussian(2.0));
        }
    }

    #[test]
    fn test_zero_stddev_is_silent() {
        let mut noise = NoiseGenerator::new(7);
        assert!((0..10).all(|_| noise.gaussian(0.0) == 0.0));
    }

    #[test]
    fn test_chance_rate() {
        let mut noise = NoiseGenerator::new(11);
        let hits = (0..10_000).filter(|_| noise.chance(0.2)).count();
        let ratio = hits as f64 / 10_000.0;
        assert!((ratio - 0.2).abs() < 0.03, "ratio={ratio}");
        assert!(!noise.chance(0.0));
    }
}
