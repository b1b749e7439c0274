//! Line and range sensor simulation
//!
//! The floor is painted with grid lines on every multiple of the arena's
//! grid spacing along both axes. The range sensor sees only the four arena
//! walls.

use super::config::{ArenaConfig, LineSensorConfig, RangeSensorConfig};
use super::noise::NoiseGenerator;
use crate::core::types::RangeReading;

/// Downward reflected-light sensor over the gridded floor
pub struct LineSensorSimulator {
    config: LineSensorConfig,
    noise: NoiseGenerator,
}

impl LineSensorSimulator {
    pub fn new(config: &LineSensorConfig, noise: NoiseGenerator) -> Self {
        Self {
            config: config.clone(),
            noise,
        }
    }

    /// Intensity seen by a sensor at world position (`x`, `y`)
    pub fn read(&mut self, x: f64, y: f64, arena: &ArenaConfig) -> f32 {
        let base = if on_grid_line(x, y, arena) {
            self.config.line_intensity
        } else {
            self.config.floor_intensity
        };
        let noisy = base as f64 + self.noise.gaussian(self.config.noise_stddev as f64);
        noisy.clamp(0.0, 1.0) as f32
    }
}

/// True when the point lies on a painted line along either axis.
pub fn on_grid_line(x: f64, y: f64, arena: &ArenaConfig) -> bool {
    let half_width = arena.line_width / 2.0;
    distance_to_line(x, arena.grid_spacing) <= half_width
        || distance_to_line(y, arena.grid_spacing) <= half_width
}

fn distance_to_line(coord: f64, spacing: f64) -> f64 {
    (coord - (coord / spacing).round() * spacing).abs()
}

/// Forward-facing range sensor
pub struct RangeSensorSimulator {
    config: RangeSensorConfig,
    noise: NoiseGenerator,
}

impl RangeSensorSimulator {
    pub fn new(config: &RangeSensorConfig, noise: NoiseGenerator) -> Self {
        Self {
            config: config.clone(),
            noise,
        }
    }

    /// Distance from (`x`, `y`) along `heading` (degrees, CCW from +y) to the nearest wall.
    pub fn read(&mut self, x: f64, y: f64, heading: f64, arena: &ArenaConfig) -> RangeReading {
        if self.noise.chance(self.config.dropout_rate as f64) {
            return RangeReading::NoEcho;
        }

        let Some(distance) = ray_to_walls(x, y, heading, arena) else {
            return RangeReading::NoEcho;
        };
        let measured = distance + self.noise.gaussian(self.config.noise_stddev as f64);
        if measured > self.config.max_range as f64 {
            RangeReading::NoEcho
        } else {
            RangeReading::Echo(measured.max(0.0) as f32)
        }
    }
}

/// Ray cast from inside the arena to its bounding walls.
pub fn ray_to_walls(x: f64, y: f64, heading: f64, arena: &ArenaConfig) -> Option<f64> {
    let theta = heading.to_radians();
    let (dx, dy) = (-theta.sin(), theta.cos());

    let mut nearest: Option<f64> = None;
    let mut consider = |t: f64| {
        if t.is_finite() && t >= 0.0 {
            nearest = Some(nearest.map_or(t, |n| n.min(t)));
        }
    };

    if dx.abs() > 1e-12 {
        let wall = if dx > 0.0 { arena.max_x } else { arena.min_x };
        consider((wall - x) / dx);
    }
    if dy.abs() > 1e-12 {
        let wall = if dy > 0.0 { arena.max_y } else { arena.min_y };
        consider((wall - y) / dy);
    }
    nearest
}
