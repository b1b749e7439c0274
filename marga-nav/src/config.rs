//! Configuration loading for MargaNav
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for the reference robot.

use crate::error::{MargaError, Result};
use marga_io::DeviceConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub odometer: OdometerConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Kinematic constants of the robot
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Drive wheel radius in cm (default: 2.18)
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Distance between wheel contact points in cm (default: 13.6)
    #[serde(default = "default_track")]
    pub track: f64,

    /// Line sensor offset ahead of the turning centre in cm (default: -10.5)
    #[serde(default = "default_line_sensor_forward")]
    pub line_sensor_forward: f64,

    /// Line sensor offset left of the turning centre in cm (default: -6.8)
    #[serde(default = "default_line_sensor_left")]
    pub line_sensor_left: f64,

    /// Motor speed limit in deg/s (default: 720)
    #[serde(default = "default_max_wheel_speed")]
    pub max_wheel_speed: f64,
}

/// Floor grid geometry
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Distance between adjacent lines in cm (default: 30.48)
    #[serde(default = "default_grid_spacing")]
    pub spacing: f64,

    /// Painted line width in cm (default: 1.2)
    #[serde(default = "default_line_width")]
    pub line_width: f64,

    /// World x of one vertical line (default: 0)
    #[serde(default)]
    pub origin_x: f64,

    /// World y of one horizontal line (default: 0)
    #[serde(default)]
    pub origin_y: f64,
}

/// Odometer process
#[derive(Clone, Debug, Deserialize)]
pub struct OdometerConfig {
    /// Tick period in milliseconds (default: 10)
    #[serde(default = "default_fast_period_ms")]
    pub period_ms: u64,
}

/// Drift correction process
#[derive(Clone, Debug, Deserialize)]
pub struct CorrectionConfig {
    /// Tick period in milliseconds (default: 10)
    #[serde(default = "default_fast_period_ms")]
    pub period_ms: u64,

    /// Samples in the rolling floor baseline (default: 8)
    #[serde(default = "default_baseline_window")]
    pub baseline_window: usize,

    /// Intensity drop below baseline that counts as a line (default: 0.15)
    #[serde(default = "default_intensity_drop")]
    pub threshold: f32,

    /// Minimum time between two crossings in milliseconds (default: 300)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Maximum heading deviation from an axis for a correction (default: 15)
    #[serde(default = "default_axis_tolerance")]
    pub axis_tolerance_deg: f64,

    /// Skip crossings while turning faster than this, deg/s (default: 20)
    #[serde(default = "default_max_turn_rate")]
    pub max_turn_rate: f64,

    /// Largest correction applied in cm; bigger jumps are ignored (default: 8)
    #[serde(default = "default_max_correction")]
    pub max_correction: f64,
}

/// Startup localization
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LocalizationConfig {
    #[serde(default)]
    pub range: RangeLocalizerConfig,
    #[serde(default)]
    pub line: LineLocalizerConfig,
}

/// Range-based heading calibration
#[derive(Clone, Debug, Deserialize)]
pub struct RangeLocalizerConfig {
    /// Tick period in milliseconds (default: 10)
    #[serde(default = "default_fast_period_ms")]
    pub period_ms: u64,

    /// Wheel speed while searching for edges in deg/s (default: 120)
    #[serde(default = "default_search_speed")]
    pub search_speed: f64,

    /// Wheel speed for refinement sweeps in deg/s (default: 40)
    #[serde(default = "default_refine_speed")]
    pub refine_speed: f64,

    /// Readings below this distance are "wall" in cm (default: 50)
    #[serde(default = "default_wall_threshold")]
    pub wall_threshold: f64,

    /// Hysteresis above the threshold before "open" in cm (default: 4)
    #[serde(default = "default_edge_margin")]
    pub edge_margin: f64,

    /// Sweep start offset before each coarse edge in degrees (default: 15)
    #[serde(default = "default_refine_window")]
    pub refine_window_deg: f64,

    /// Heading that faces the wall corner once calibrated (default: 135)
    #[serde(default = "default_corner_heading")]
    pub corner_heading: f64,

    /// Full-rotation attempts before giving up (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Line-based position calibration
#[derive(Clone, Debug, Deserialize)]
pub struct LineLocalizerConfig {
    /// Tick period in milliseconds (default: 10)
    #[serde(default = "default_fast_period_ms")]
    pub period_ms: u64,

    /// Wheel speed for turning to a canonical heading in deg/s (default: 120)
    #[serde(default = "default_search_speed")]
    pub rotate_speed: f64,

    /// Wheel speed while approaching a line in deg/s (default: 180)
    #[serde(default = "default_approach_speed")]
    pub approach_speed: f64,

    /// Wheel speed for the back-off and creep refinement in deg/s (default: 45)
    #[serde(default = "default_creep_speed")]
    pub creep_speed: f64,

    /// Maximum travel while looking for a line in cm (default: 45)
    #[serde(default = "default_capture_distance")]
    pub capture_distance: f64,

    /// Maximum back-off travel before the line must be lost in cm (default: 6)
    #[serde(default = "default_backoff_limit")]
    pub backoff_limit: f64,

    /// Intersection to localize against, world cm (default: 0, 0)
    #[serde(default)]
    pub target_x: f64,
    #[serde(default)]
    pub target_y: f64,
}

/// Navigation controller
#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Tick period in milliseconds (default: 20)
    #[serde(default = "default_nav_period_ms")]
    pub period_ms: u64,

    /// Wheel speed while translating in deg/s (default: 360)
    #[serde(default = "default_cruise_speed")]
    pub cruise_speed: f64,

    /// Slowest translation speed near the target in deg/s (default: 60)
    #[serde(default = "default_min_drive_speed")]
    pub min_drive_speed: f64,

    /// Fastest in-place rotation in deg/s (default: 180)
    #[serde(default = "default_rotate_speed")]
    pub rotate_speed: f64,

    /// Slowest in-place rotation in deg/s (default: 30)
    #[serde(default = "default_min_rotate_speed")]
    pub min_rotate_speed: f64,

    /// Rotation wheel speed per degree of heading error (default: 6)
    #[serde(default = "default_turn_gain")]
    pub turn_gain: f64,

    /// Heading error below which rotation ends in degrees (default: 2)
    #[serde(default = "default_rotate_tolerance")]
    pub rotate_tolerance_deg: f64,

    /// Heading error that sends a translating robot back to rotating (default: 12)
    #[serde(default = "default_hysteresis")]
    pub hysteresis_deg: f64,

    /// Distance at which a target counts as reached in cm (default: 1)
    #[serde(default = "default_distance_tolerance")]
    pub distance_tolerance: f64,

    /// Differential wheel speed per degree of heading error (default: 8)
    #[serde(default = "default_steering_gain")]
    pub steering_gain: f64,

    /// Distance over which speed ramps down to the target in cm (default: 10)
    #[serde(default = "default_approach_distance")]
    pub approach_distance: f64,
}

/// Waypoint mission run by the daemon
#[derive(Clone, Debug, Deserialize)]
pub struct MissionConfig {
    /// Waypoints in tile units from the grid origin
    #[serde(default = "default_waypoints")]
    pub waypoints: Vec<[f64; 2]>,

    /// Per-waypoint timeout in seconds (default: 60)
    #[serde(default = "default_waypoint_timeout")]
    pub waypoint_timeout_secs: f64,

    /// Pose log interval in milliseconds (default: 1000)
    #[serde(default = "default_pose_log_ms")]
    pub pose_log_ms: u64,
}

// Default value functions
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
fn default_grid_spacing() -> f64 {
    30.48
}
fn default_line_width() -> f64 {
    1.2
}
fn default_fast_period_ms() -> u64 {
    10
}
fn default_nav_period_ms() -> u64 {
    20
}

// Correction defaults
fn default_baseline_window() -> usize {
    8
}
fn default_intensity_drop() -> f32 {
    0.15
}
fn default_cooldown_ms() -> u64 {
    300
}
fn default_axis_tolerance() -> f64 {
    15.0
}
fn default_max_turn_rate() -> f64 {
    20.0
}
fn default_max_correction() -> f64 {
    8.0
}

// Localization defaults
fn default_search_speed() -> f64 {
    120.0
}
fn default_refine_speed() -> f64 {
    40.0
}
fn default_wall_threshold() -> f64 {
    50.0
}
fn default_edge_margin() -> f64 {
    4.0
}
fn default_refine_window() -> f64 {
    15.0
}
fn default_corner_heading() -> f64 {
    135.0
}
fn default_max_attempts() -> u32 {
    3
}
fn default_approach_speed() -> f64 {
    180.0
}
fn default_creep_speed() -> f64 {
    45.0
}
fn default_capture_distance() -> f64 {
    45.0
}
fn default_backoff_limit() -> f64 {
    6.0
}

// Navigation defaults
fn default_cruise_speed() -> f64 {
    360.0
}
fn default_min_drive_speed() -> f64 {
    60.0
}
fn default_rotate_speed() -> f64 {
    180.0
}
fn default_min_rotate_speed() -> f64 {
    30.0
}
fn default_turn_gain() -> f64 {
    6.0
}
fn default_rotate_tolerance() -> f64 {
    2.0
}
fn default_hysteresis() -> f64 {
    12.0
}
fn default_distance_tolerance() -> f64 {
    1.0
}
fn default_steering_gain() -> f64 {
    8.0
}
fn default_approach_distance() -> f64 {
    10.0
}

// Mission defaults
fn default_waypoints() -> Vec<[f64; 2]> {
    // A square through four tile centres, back to the first
    vec![[0.5, 0.5], [2.5, 0.5], [2.5, 2.5], [0.5, 2.5], [0.5, 0.5]]
}
fn default_waypoint_timeout() -> f64 {
    60.0
}
fn default_pose_log_ms() -> u64 {
    1000
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_radius: default_wheel_radius(),
            track: default_track(),
            line_sensor_forward: default_line_sensor_forward(),
            line_sensor_left: default_line_sensor_left(),
            max_wheel_speed: default_max_wheel_speed(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: default_grid_spacing(),
            line_width: default_line_width(),
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Default for OdometerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_fast_period_ms(),
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            period_ms: default_fast_period_ms(),
            baseline_window: default_baseline_window(),
            threshold: default_intensity_drop(),
            cooldown_ms: default_cooldown_ms(),
            axis_tolerance_deg: default_axis_tolerance(),
            max_turn_rate: default_max_turn_rate(),
            max_correction: default_max_correction(),
        }
    }
}

impl Default for RangeLocalizerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_fast_period_ms(),
            search_speed: default_search_speed(),
            refine_speed: default_refine_speed(),
            wall_threshold: default_wall_threshold(),
            edge_margin: default_edge_margin(),
            refine_window_deg: default_refine_window(),
            corner_heading: default_corner_heading(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LineLocalizerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_fast_period_ms(),
            rotate_speed: default_search_speed(),
            approach_speed: default_approach_speed(),
            creep_speed: default_creep_speed(),
            capture_distance: default_capture_distance(),
            backoff_limit: default_backoff_limit(),
            target_x: 0.0,
            target_y: 0.0,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            period_ms: default_nav_period_ms(),
            cruise_speed: default_cruise_speed(),
            min_drive_speed: default_min_drive_speed(),
            rotate_speed: default_rotate_speed(),
            min_rotate_speed: default_min_rotate_speed(),
            turn_gain: default_turn_gain(),
            rotate_tolerance_deg: default_rotate_tolerance(),
            hysteresis_deg: default_hysteresis(),
            distance_tolerance: default_distance_tolerance(),
            steering_gain: default_steering_gain(),
            approach_distance: default_approach_distance(),
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            waypoints: default_waypoints(),
            waypoint_timeout_secs: default_waypoint_timeout(),
            pose_log_ms: default_pose_log_ms(),
        }
    }
}

impl OdometerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl CorrectionConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Cooldown expressed in correction ticks (at least one)
    pub fn cooldown_ticks(&self) -> u32 {
        let ticks = self.cooldown_ms.div_ceil(self.period_ms.max(1));
        ticks.clamp(1, u32::MAX as u64) as u32
    }
}

impl RangeLocalizerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl LineLocalizerConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl NavigationConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl GridConfig {
    /// World coordinates of a point given in tile units from the origin.
    pub fn tile_to_world(&self, tx: f64, ty: f64) -> (f64, f64) {
        (
            self.origin_x + tx * self.spacing,
            self.origin_y + ty * self.spacing,
        )
    }
}

impl MargaConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| MargaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MargaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the integrators or controllers meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("robot.wheel_radius", self.robot.wheel_radius),
            ("robot.track", self.robot.track),
            ("robot.max_wheel_speed", self.robot.max_wheel_speed),
            ("grid.spacing", self.grid.spacing),
            ("navigation.cruise_speed", self.navigation.cruise_speed),
            ("navigation.rotate_speed", self.navigation.rotate_speed),
            ("navigation.distance_tolerance", self.navigation.distance_tolerance),
            ("localization.range.search_speed", self.localization.range.search_speed),
            ("localization.range.refine_speed", self.localization.range.refine_speed),
            ("localization.line.approach_speed", self.localization.line.approach_speed),
            ("localization.line.creep_speed", self.localization.line.creep_speed),
            ("localization.line.capture_distance", self.localization.line.capture_distance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(MargaError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let periods = [
            ("odometer.period_ms", self.odometer.period_ms),
            ("correction.period_ms", self.correction.period_ms),
            ("localization.range.period_ms", self.localization.range.period_ms),
            ("localization.line.period_ms", self.localization.line.period_ms),
            ("navigation.period_ms", self.navigation.period_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(MargaError::Config(format!("{} must be non-zero", name)));
            }
        }

        if self.correction.baseline_window == 0 {
            return Err(MargaError::Config(
                "correction.baseline_window must be at least 1".to_string(),
            ));
        }
        if self.navigation.hysteresis_deg < self.navigation.rotate_tolerance_deg {
            return Err(MargaError::Config(format!(
                "navigation.hysteresis_deg ({}) must not be below rotate_tolerance_deg ({})",
                self.navigation.hysteresis_deg, self.navigation.rotate_tolerance_deg
            )));
        }
        if self.localization.range.max_attempts == 0 {
            return Err(MargaError::Config(
                "localization.range.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
