//! Grid-line drift correction
//!
//! Watches the downward line sensor while the robot drives and, each time
//! the sensor crosses a painted grid line, snaps the pose coordinate along
//! the direction of travel so the sensor sits on that line. Heading is never
//! touched.
//!
//! Detection is relative: a crossing is the first tick whose intensity is
//! more than `threshold` below the rolling floor baseline, followed by a
//! cooldown so one physical line is only counted once.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marga_io::LineSensor;

use crate::config::{CorrectionConfig, GridConfig};
use crate::error::Result;
use crate::kinematics::Kinematics;
use crate::shared::{Pose, SharedPose};
use crate::utils::{angle_diff, nearest_canonical};

// ============================================================================
// Line detection
// ============================================================================

/// Edge detector for dark grid lines against a rolling floor baseline
#[derive(Clone, Debug)]
pub struct LineDetector {
    window: VecDeque<f32>,
    capacity: usize,
    threshold: f32,
    cooldown_ticks: u32,
    cooldown_remaining: u32,
    dark: bool,
}

impl LineDetector {
    pub fn new(capacity: usize, threshold: f32, cooldown_ticks: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            threshold,
            cooldown_ticks,
            cooldown_remaining: 0,
            dark: false,
        }
    }

    pub fn from_config(config: &CorrectionConfig) -> Self {
        Self::new(
            config.baseline_window,
            config.threshold,
            config.cooldown_ticks(),
        )
    }

    /// Mean floor intensity, once the window is full
    pub fn baseline(&self) -> Option<f32> {
        if self.window.len() < self.capacity {
            return None;
        }
        Some(self.window.iter().sum::<f32>() / self.window.len() as f32)
    }

    /// Whether `intensity` reads as a line against the current baseline
    pub fn is_dark(&self, intensity: f32) -> bool {
        self.baseline()
            .is_some_and(|baseline| intensity < baseline - self.threshold)
    }

    /// Whether the last sample was over a line
    pub fn on_line(&self) -> bool {
        self.dark
    }

    /// Feed one sample. Returns true on the tick a new crossing begins.
    pub fn push(&mut self, intensity: f32) -> bool {
        let dark = self.is_dark(intensity);
        self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);

        let crossing = dark && !self.dark && self.cooldown_remaining == 0;
        if crossing {
            self.cooldown_remaining = self.cooldown_ticks;
        }

        // Line samples would drag the floor baseline down
        if !dark {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(intensity);
        }
        self.dark = dark;
        crossing
    }

    /// Allow the next dark edge to count immediately.
    pub fn reset_cooldown(&mut self) {
        self.cooldown_remaining = 0;
    }

    /// Forget the baseline and all history.
    pub fn reset(&mut self) {
        self.window.clear();
        self.cooldown_remaining = 0;
        self.dark = false;
    }
}

// ============================================================================
// Drift corrector
// ============================================================================

/// Pose axis a crossing constrains
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Why a detected crossing did not change the pose
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Heading too far from every axis
    Diagonal,
    /// Robot turning, crossing geometry unknown
    Turning,
    /// Nearest line further than `max_correction`
    TooFar,
    /// Switched off between sampling and applying
    Disabled,
}

/// Result of one corrector tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CorrectionOutcome {
    /// Correction is switched off; the sensor was not read
    Off,
    /// No new crossing this tick
    NoCrossing,
    Corrected { axis: Axis, delta: f64 },
    Skipped(SkipReason),
}

/// Running counters, for status logging
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CorrectionStats {
    pub crossings: u64,
    pub corrected: u64,
    pub skipped: u64,
}

/// Shared on/off switch for a [`DriftCorrector`]
#[derive(Clone, Debug, Default)]
pub struct CorrectionSwitch(Arc<AtomicBool>);

impl CorrectionSwitch {
    pub fn set_on(&self, on: bool) {
        let was = self.0.swap(on, Ordering::SeqCst);
        if was != on {
            log::info!("Drift correction {}", if on { "enabled" } else { "disabled" });
        }
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Snap `coord` to the nearest line of a family through `origin` every `spacing`.
pub fn nearest_line(coord: f64, origin: f64, spacing: f64) -> f64 {
    origin + ((coord - origin) / spacing).round() * spacing
}

/// Periodic line-crossing drift corrector
pub struct DriftCorrector {
    config: CorrectionConfig,
    grid: GridConfig,
    kinematics: Kinematics,
    sensor: Arc<dyn LineSensor>,
    pose: SharedPose,
    switch: CorrectionSwitch,
    detector: LineDetector,
    /// Pose seen on the previous enabled tick
    previous: Option<Pose>,
    /// Last non-zero sensor motion, for the travel direction
    last_motion: (f64, f64),
    stats: CorrectionStats,
}

impl DriftCorrector {
    pub fn new(
        config: CorrectionConfig,
        grid: GridConfig,
        kinematics: Kinematics,
        sensor: Arc<dyn LineSensor>,
        pose: SharedPose,
    ) -> Self {
        Self {
            detector: LineDetector::from_config(&config),
            config,
            grid,
            kinematics,
            sensor,
            pose,
            switch: CorrectionSwitch::default(),
            previous: None,
            last_motion: (0.0, 0.0),
            stats: CorrectionStats::default(),
        }
    }

    /// Handle for toggling correction from another thread
    pub fn switch(&self) -> CorrectionSwitch {
        self.switch.clone()
    }

    pub fn set_on(&self, on: bool) {
        self.switch.set_on(on);
    }

    pub fn is_on(&self) -> bool {
        self.switch.is_on()
    }

    pub fn stats(&self) -> CorrectionStats {
        self.stats
    }

    /// One correction period.
    pub fn tick(&mut self) -> Result<CorrectionOutcome> {
        if !self.switch.is_on() {
            // Stale baseline and motion must not leak into the next enable
            if self.previous.take().is_some() {
                self.detector.reset();
                self.last_motion = (0.0, 0.0);
            }
            return Ok(CorrectionOutcome::Off);
        }

        let intensity = self.sensor.intensity()?;
        let crossing = self.detector.push(intensity);

        let current = self.pose.get();
        let previous = self.previous.replace(current).unwrap_or(current);
        self.track_motion(&previous, &current);

        if !crossing {
            return Ok(CorrectionOutcome::NoCrossing);
        }
        self.stats.crossings += 1;

        let outcome = self.apply_crossing(previous);
        match outcome {
            CorrectionOutcome::Corrected { axis, delta } => {
                self.stats.corrected += 1;
                log::debug!("Line crossing: corrected {:?} by {:+.2} cm", axis, delta);
            }
            CorrectionOutcome::Skipped(reason) => {
                self.stats.skipped += 1;
                log::debug!("Line crossing skipped: {:?}", reason);
            }
            _ => {}
        }
        Ok(outcome)
    }

    fn track_motion(&mut self, previous: &Pose, current: &Pose) {
        let (px, py) = self.kinematics.sensor_position(previous);
        let (cx, cy) = self.kinematics.sensor_position(current);
        let motion = (cx - px, cy - py);
        if motion.0.abs() > 1e-9 || motion.1.abs() > 1e-9 {
            self.last_motion = motion;
        }
    }

    /// Snap the pose for a crossing, under the pose lock.
    fn apply_crossing(&mut self, previous: Pose) -> CorrectionOutcome {
        let max_turn = self.config.max_turn_rate * self.config.period().as_secs_f64();
        let half_width = self.grid.line_width / 2.0;
        let mut outcome = CorrectionOutcome::Skipped(SkipReason::Disabled);

        let switch = &self.switch;
        let config = &self.config;
        let grid = &self.grid;
        let kinematics = &self.kinematics;
        let last_motion = self.last_motion;
        let after = self.pose.update_with(|pose| {
            if !switch.is_on() {
                return;
            }
            let axis_heading = nearest_canonical(pose.heading);
            if angle_diff(pose.heading, axis_heading).abs() > config.axis_tolerance_deg {
                outcome = CorrectionOutcome::Skipped(SkipReason::Diagonal);
                return;
            }
            if angle_diff(pose.heading, previous.heading).abs() > max_turn {
                outcome = CorrectionOutcome::Skipped(SkipReason::Turning);
                return;
            }

            // Driving along y crosses horizontal lines, and vice versa
            let axis = if axis_heading == 0.0 || axis_heading == 180.0 {
                Axis::Y
            } else {
                Axis::X
            };
            let (sx, sy) = kinematics.sensor_position(pose);
            let (coord, origin, motion) = match axis {
                Axis::X => (sx, grid.origin_x, last_motion.0),
                Axis::Y => (sy, grid.origin_y, last_motion.1),
            };

            // The sensor darkens on the near edge of the line
            let line = nearest_line(coord, origin, grid.spacing);
            let lead = if motion > 0.0 {
                half_width
            } else if motion < 0.0 {
                -half_width
            } else {
                0.0
            };
            let delta = line - lead - coord;
            if delta.abs() > config.max_correction {
                outcome = CorrectionOutcome::Skipped(SkipReason::TooFar);
                return;
            }

            match axis {
                Axis::X => pose.x += delta,
                Axis::Y => pose.y += delta,
            }
            outcome = CorrectionOutcome::Corrected { axis, delta };
        });
        // The jump is not motion
        self.previous = Some(after);
        outcome
    }
}
