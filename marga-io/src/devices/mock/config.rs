//! Mock device simulation configuration
//!
//! Every parameter has a default matching the reference robot (2.18 cm
//! wheels, 13.6 cm track, 30.48 cm floor tiles), so a bare `[device.simulation]`
//! table is enough for a working simulation.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! SimulationConfig
//! ├── start_x/y/heading             # Where the robot really starts
//! ├── rate_hz, speed_factor         # Simulation timing
//! ├── random_seed                   # 0 = entropy
//! ├── SimRobotConfig                # True kinematics and sensor mounting
//! ├── ArenaConfig                   # Walls and grid lines
//! ├── EncoderConfig                 # Wheel slip
//! ├── LineSensorConfig              # Floor/line intensity and noise
//! └── RangeSensorConfig             # Max range, noise, dropouts
//! ```
//!
//! The simulated robot's kinematic constants are deliberately separate from
//! the navigation config: setting them apart lets tests model calibration
//! error between the real robot and the constants the odometer believes.

use serde::{Deserialize, Serialize};

// ============================================================================
// Robot
// ============================================================================

/// True physical parameters of the simulated robot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimRobotConfig {
    /// Drive wheel radius (cm)
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Distance between the wheel contact points (cm)
    #[serde(default = "default_track")]
    pub track: f64,

    /// Line sensor position ahead of the turning centre (cm, negative = behind)
    #[serde(default = "default_line_sensor_forward")]
    pub line_sensor_forward: f64,

    /// Line sensor position left of the turning centre (cm, negative = right)
    #[serde(default = "default_line_sensor_left")]
    pub line_sensor_left: f64,

    /// Range sensor position ahead of the turning centre (cm)
    #[serde(default)]
    pub range_sensor_forward: f64,

    /// Motor speed limit (deg/s)
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f64,
}

fn default_wheel_radius() -> f64 {
    2.18
}
fn default_track() -> f64 {
    13.6
}
fn default_line_sensor_forward() -> f64 {
    -10.5
}
fn default_line_sensor_left() -> f64 {
    -6.8
}
fn default_max_wheel_speed() -> f64 {
    720.0
}

impl Default for SimRobotConfig {
    fn default() -> Self {
        Self {
            wheel_radius: default_wheel_radius(),
            track: default_track(),
            line_sensor_forward: default_line_sensor_forward(),
            line_sensor_left: default_line_sensor_left(),
            range_sensor_forward: 0.0,
            max_wheel_speed: default_max_wheel_speed(),
        }
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Walled rectangle with grid lines every `grid_spacing` centimetres.
///
/// Grid lines lie on multiples of the spacing, so the line intersection
/// nearest the lower-left corner tile is the world origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArenaConfig {
    #[serde(default = "default_grid_spacing")]
    pub grid_spacing: f64,

    /// Painted line width (cm)
    #[serde(default = "default_line_width")]
    pub line_width: f64,

    #[serde(default = "default_min_corner")]
    pub min_x: f64,
    #[serde(default = "default_min_corner")]
    pub min_y: f64,
    #[serde(default = "default_max_corner")]
    pub max_x: f64,
    #[serde(default = "default_max_corner")]
    pub max_y: f64,
}

fn default_grid_spacing() -> f64 {
    30.48
}
fn default_line_width() -> f64 {
    1.2
}
fn default_min_corner() -> f64 {
    -30.48
}
fn default_max_corner() -> f64 {
    7.0 * 30.48
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            grid_spacing: default_grid_spacing(),
            line_width: default_line_width(),
            min_x: default_min_corner(),
            min_y: default_min_corner(),
            max_x: default_max_corner(),
            max_y: default_max_corner(),
        }
    }
}

// ============================================================================
// Sensors
// ============================================================================

/// Wheel encoder noise
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EncoderConfig {
    /// Multiplicative slip standard deviation per step (0.01 = 1%)
    #[serde(default)]
    pub slip_stddev: f64,

    /// Systematic slip bias (0.01 = wheel reports 1% more than it travels)
    #[serde(default)]
    pub slip_bias: f64,
}

/// Line sensor simulation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LineSensorConfig {
    /// Intensity over bare floor
    #[serde(default = "default_floor_intensity")]
    pub floor_intensity: f32,

    /// Intensity over a grid line
    #[serde(default = "default_line_intensity")]
    pub line_intensity: f32,

    #[serde(default = "default_line_noise")]
    pub noise_stddev: f32,
}

fn default_floor_intensity() -> f32 {
    0.55
}
fn default_line_intensity() -> f32 {
    0.15
}
fn default_line_noise() -> f32 {
    0.01
}

impl Default for LineSensorConfig {
    fn default() -> Self {
        Self {
            floor_intensity: default_floor_intensity(),
            line_intensity: default_line_intensity(),
            noise_stddev: default_line_noise(),
        }
    }
}

/// Range sensor simulation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RangeSensorConfig {
    /// Readings beyond this are reported as "no echo" (cm)
    #[serde(default = "default_max_range")]
    pub max_range: f32,

    #[serde(default = "default_range_noise")]
    pub noise_stddev: f32,

    /// Probability that a reading is dropped
    #[serde(default)]
    pub dropout_rate: f32,
}

fn default_max_range() -> f32 {
    255.0
}
fn default_range_noise() -> f32 {
    0.5
}

impl Default for RangeSensorConfig {
    fn default() -> Self {
        Self {
            max_range: default_max_range(),
            noise_stddev: default_range_noise(),
            dropout_rate: 0.0,
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Complete simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// True starting x (cm)
    #[serde(default = "default_start_xy")]
    pub start_x: f64,

    /// True starting y (cm)
    #[serde(default = "default_start_xy")]
    pub start_y: f64,

    /// True starting heading (degrees, CCW from +y)
    #[serde(default = "default_start_heading")]
    pub start_heading: f64,

    /// Physics steps per simulated second
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Simulated seconds per wall-clock second
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,

    /// Noise seed (0 = random each run)
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    #[serde(default)]
    pub robot: SimRobotConfig,

    #[serde(default)]
    pub arena: ArenaConfig,

    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default)]
    pub line_sensor: LineSensorConfig,

    #[serde(default)]
    pub range_sensor: RangeSensorConfig,
}

fn default_start_xy() -> f64 {
    -15.24
}
fn default_start_heading() -> f64 {
    60.0
}
fn default_rate_hz() -> f64 {
    200.0
}
fn default_speed_factor() -> f64 {
    1.0
}
fn default_random_seed() -> u64 {
    42
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_x: default_start_xy(),
            start_y: default_start_xy(),
            start_heading: default_start_heading(),
            rate_hz: default_rate_hz(),
            speed_factor: default_speed_factor(),
            random_seed: default_random_seed(),
            robot: SimRobotConfig::default(),
            arena: ArenaConfig::default(),
            encoder: EncoderConfig::default(),
            line_sensor: LineSensorConfig::default(),
            range_sensor: RangeSensorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_place_robot_in_corner_tile() {
        let config = SimulationConfig::default();
        assert!(config.start_x > config.arena.min_x && config.start_x < 0.0);
        assert!(config.start_y > config.arena.min_y && config.start_y < 0.0);
    }

    #[test]
    fn test_partial_robot_table() {
        let config: SimulationConfig = toml::from_str(
            r#"
[robot]
track = 14.0
"#,
        )
        .unwrap();
        assert_eq!(config.robot.track, 14.0);
        assert_eq!(config.robot.wheel_radius, 2.18);
        assert_eq!(config.speed_factor, 1.0);
    }
}
