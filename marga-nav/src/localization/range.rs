//! Range-based heading calibration.
//!
//! The robot starts in a corner tile with two perpendicular walls nearby. It
//! spins counter-clockwise in place and watches the range sensor: readings
//! drop when the sensor swings onto the walls (falling edge) and recover
//! when it swings past them (rising edge). The middle of that wall arc
//! faces the corner, which sits at a known heading in the world frame.
//!
//! Each coarse edge is then re-measured with a slow sweep. The falling edge
//! is approached counter-clockwise and the rising edge clockwise, so both
//! sweeps enter the wall arc from outside and their detection lag cancels
//! in the midpoint.
//!
//! ```text
//! RotateSearching ──► RotateRefining ──► HeadingComputed ──► Done
//!        ▲                   │
//!        └── retry (bounded) ┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marga_io::{DriveMotors, RangeReading, RangeSensor};

use crate::config::RangeLocalizerConfig;
use crate::error::{MargaError, Result};
use crate::navigation::{MotorCommand, spin_command};
use crate::shared::{Pose, SharedPose};
use crate::utils::{angle_diff, normalize_degrees};

/// Consecutive samples needed to accept a zone change
const CONFIRM_SAMPLES: u32 = 2;
/// Heading error at which a positioning turn is done (degrees)
const POSITION_TOLERANCE: f64 = 0.5;
/// Wheel speed per degree of error while positioning
const POSITION_GAIN: f64 = 3.0;
const POSITION_MIN_SPEED: f64 = 15.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangePhase {
    RotateSearching,
    RotateRefining,
    HeadingComputed,
    Done,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RefineStep {
    /// Turn to just past the rising edge
    ToRising,
    /// Clockwise sweep back onto the walls
    SweepRising,
    /// Turn to just before the falling edge
    ToFalling,
    /// Counter-clockwise sweep onto the walls
    SweepFalling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Zone {
    Wall,
    Open,
}

/// Wall/open classifier with hysteresis and a short confirmation count
#[derive(Debug)]
struct ZoneTracker {
    threshold: f64,
    margin: f64,
    zone: Option<Zone>,
    /// Candidate zone, heading of its first sample, samples seen
    candidate: Option<(Zone, f64, u32)>,
}

impl ZoneTracker {
    fn new(threshold: f64, margin: f64) -> Self {
        Self {
            threshold,
            margin,
            zone: None,
            candidate: None,
        }
    }

    fn reset(&mut self) {
        self.zone = None;
        self.candidate = None;
    }

    /// Returns the new zone and the heading where it began, on a confirmed change.
    fn update(&mut self, distance: f64, heading: f64) -> Option<(Zone, f64)> {
        let raw = if distance < self.threshold {
            Zone::Wall
        } else if distance > self.threshold + self.margin {
            Zone::Open
        } else {
            return None;
        };

        let Some(current) = self.zone else {
            self.zone = Some(raw);
            return None;
        };
        if raw == current {
            self.candidate = None;
            return None;
        }

        let (start, count) = match self.candidate {
            Some((zone, start, count)) if zone == raw => (start, count + 1),
            _ => (heading, 1),
        };
        if count >= CONFIRM_SAMPLES {
            self.zone = Some(raw);
            self.candidate = None;
            Some((raw, start))
        } else {
            self.candidate = Some((raw, start, count));
            None
        }
    }
}

/// Result of a successful calibration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeFix {
    /// Odometer heading minus true heading, degrees in (-180, 180]
    pub heading_offset: f64,
    /// Refined (falling, rising) edge headings in the odometer frame
    pub edges: (f64, f64),
    /// Pose written to the estimator
    pub seeded: Pose,
}

/// One-shot heading calibration against the corner walls
pub struct RangeLocalizer {
    config: RangeLocalizerConfig,
    range: Arc<dyn RangeSensor>,
    motors: Arc<dyn DriveMotors>,
    pose: SharedPose,
    phase: RangePhase,
    refine: RefineStep,
    attempt: u32,
    zones: ZoneTracker,
    /// Odometer heading accumulated without wrapping
    unwrapped: f64,
    last_heading: Option<f64>,
    /// Unwrapped heading where the current search or sweep began
    sweep_start: f64,
    /// Unwrapped heading where open space was first seen this attempt
    armed_at: Option<f64>,
    falling: Option<f64>,
    rising: Option<f64>,
    refined_rising: Option<f64>,
    refined_falling: Option<f64>,
}

impl RangeLocalizer {
    pub fn new(
        config: RangeLocalizerConfig,
        range: Arc<dyn RangeSensor>,
        motors: Arc<dyn DriveMotors>,
        pose: SharedPose,
    ) -> Self {
        Self {
            zones: ZoneTracker::new(config.wall_threshold, config.edge_margin),
            config,
            range,
            motors,
            pose,
            phase: RangePhase::RotateSearching,
            refine: RefineStep::ToRising,
            attempt: 0,
            unwrapped: 0.0,
            last_heading: None,
            sweep_start: 0.0,
            armed_at: None,
            falling: None,
            rising: None,
            refined_rising: None,
            refined_falling: None,
        }
    }

    pub fn phase(&self) -> RangePhase {
        self.phase
    }

    /// Attempts started so far (1 during the first rotation)
    pub fn attempts(&self) -> u32 {
        self.attempt + 1
    }

    /// Advance one tick. Returns the fix once calibration completes.
    pub fn tick(&mut self) -> Result<Option<RangeFix>> {
        let pose = self.pose.get();
        self.track_heading(pose.heading);
        let distance = match self.range.distance()? {
            RangeReading::Echo(d) => d as f64,
            RangeReading::NoEcho => f64::INFINITY,
        };

        match self.phase {
            RangePhase::RotateSearching => self.search(distance)?,
            RangePhase::RotateRefining => self.refine_step(distance)?,
            RangePhase::HeadingComputed => return self.compute(pose),
            RangePhase::Done => {}
        }
        Ok(None)
    }

    /// Run to completion at the configured period.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RangeFix> {
        log::info!("Range localization started");
        let ticker = crossbeam_channel::tick(self.config.period());
        loop {
            if ticker.recv().is_err() || !running.load(Ordering::Relaxed) {
                self.send(MotorCommand::STOP)?;
                return Err(MargaError::Interrupted);
            }
            match self.tick() {
                Ok(Some(fix)) => return Ok(fix),
                Ok(None) => {}
                Err(e) => {
                    if let Err(stop_err) = self.motors.stop() {
                        log::warn!("Failed to stop motors: {}", stop_err);
                    }
                    return Err(e);
                }
            }
        }
    }

    fn track_heading(&mut self, heading: f64) {
        match self.last_heading {
            Some(last) => self.unwrapped += angle_diff(heading, last),
            None => {
                self.unwrapped = heading;
                self.sweep_start = heading;
            }
        }
        self.last_heading = Some(heading);
    }

    fn search(&mut self, distance: f64) -> Result<()> {
        self.send(MotorCommand::new(
            -self.config.search_speed,
            self.config.search_speed,
        ))?;
        let event = self.zones.update(distance, self.unwrapped);

        let Some(armed_at) = self.armed_at else {
            if self.zones.zone == Some(Zone::Open) {
                log::debug!("Open space at {:.1}, searching for walls", self.unwrapped);
                self.armed_at = Some(self.unwrapped);
            } else if self.unwrapped - self.sweep_start > 360.0 {
                return self.fail_attempt(0);
            }
            return Ok(());
        };

        match (event, self.falling) {
            (Some((Zone::Wall, heading)), None) => {
                log::debug!("Falling edge at {:.1}", heading);
                self.falling = Some(heading);
            }
            (Some((Zone::Open, heading)), Some(falling)) => {
                log::info!(
                    "Wall arc found: falling {:.1}, rising {:.1}",
                    normalize_degrees(falling),
                    normalize_degrees(heading)
                );
                self.rising = Some(heading);
                self.send(MotorCommand::STOP)?;
                self.phase = RangePhase::RotateRefining;
                self.refine = RefineStep::ToRising;
                return Ok(());
            }
            _ => {}
        }

        if self.unwrapped - armed_at > 360.0 {
            let edges = usize::from(self.falling.is_some());
            return self.fail_attempt(edges);
        }
        Ok(())
    }

    fn refine_step(&mut self, distance: f64) -> Result<()> {
        let (Some(falling), Some(rising)) = (self.falling, self.rising) else {
            return self.fail_attempt(0);
        };
        let window = self.config.refine_window_deg;

        match self.refine {
            RefineStep::ToRising => {
                if self.turn_toward(rising + window)? {
                    self.begin_sweep(RefineStep::SweepRising);
                }
            }
            RefineStep::SweepRising => {
                let speed = self.config.refine_speed;
                self.send(MotorCommand::new(speed, -speed))?;
                if let Some((Zone::Wall, heading)) = self.zones.update(distance, self.unwrapped) {
                    log::debug!("Refined rising edge at {:.2}", normalize_degrees(heading));
                    self.refined_rising = Some(heading);
                    self.send(MotorCommand::STOP)?;
                    self.refine = RefineStep::ToFalling;
                } else if self.sweep_exhausted() {
                    return self.fail_attempt(2);
                }
            }
            RefineStep::ToFalling => {
                if self.turn_toward(falling - window)? {
                    self.begin_sweep(RefineStep::SweepFalling);
                }
            }
            RefineStep::SweepFalling => {
                let speed = self.config.refine_speed;
                self.send(MotorCommand::new(-speed, speed))?;
                if let Some((Zone::Wall, heading)) = self.zones.update(distance, self.unwrapped) {
                    log::debug!("Refined falling edge at {:.2}", normalize_degrees(heading));
                    self.refined_falling = Some(heading);
                    self.send(MotorCommand::STOP)?;
                    self.phase = RangePhase::HeadingComputed;
                } else if self.sweep_exhausted() {
                    return self.fail_attempt(2);
                }
            }
        }
        Ok(())
    }

    /// Spin the short way to `target`; true once there (motors stopped).
    fn turn_toward(&mut self, target: f64) -> Result<bool> {
        let error = angle_diff(normalize_degrees(target), normalize_degrees(self.unwrapped));
        if error.abs() <= POSITION_TOLERANCE {
            self.send(MotorCommand::STOP)?;
            return Ok(true);
        }
        self.send(spin_command(
            error,
            POSITION_GAIN,
            POSITION_MIN_SPEED,
            self.config.search_speed,
        ))?;
        Ok(false)
    }

    fn begin_sweep(&mut self, step: RefineStep) {
        self.zones.reset();
        self.sweep_start = self.unwrapped;
        self.refine = step;
    }

    fn sweep_exhausted(&self) -> bool {
        (self.unwrapped - self.sweep_start).abs() > 3.0 * self.config.refine_window_deg
    }

    fn compute(&mut self, pose: Pose) -> Result<Option<RangeFix>> {
        let (Some(rf), Some(rr)) = (self.refined_falling, self.refined_rising) else {
            self.fail_attempt(0)?;
            return Ok(None);
        };
        let span = normalize_degrees(rr - rf);
        if !(10.0..=350.0).contains(&span) {
            log::warn!("Implausible wall arc of {:.1} degrees", span);
            self.fail_attempt(2)?;
            return Ok(None);
        }

        let mid = normalize_degrees(rf + span / 2.0);
        let heading_offset = angle_diff(mid, self.config.corner_heading);
        let heading = normalize_degrees(pose.heading - heading_offset);
        self.pose.set(0.0, 0.0, heading);
        self.phase = RangePhase::Done;

        let seeded = self.pose.get();
        log::info!(
            "Range localization done: wall arc {:.1} degrees centred on {:.2}, offset {:+.2}, heading {:.2}",
            span,
            mid,
            heading_offset,
            seeded.heading
        );
        Ok(Some(RangeFix {
            heading_offset,
            edges: (normalize_degrees(rf), normalize_degrees(rr)),
            seeded,
        }))
    }

    fn fail_attempt(&mut self, edges: usize) -> Result<()> {
        self.attempt += 1;
        if self.attempt >= self.config.max_attempts {
            self.send(MotorCommand::STOP)?;
            log::error!(
                "Range localization failed after {} attempts ({} edges)",
                self.attempt,
                edges
            );
            return Err(MargaError::Calibration {
                attempts: self.attempt,
                edges,
            });
        }
        log::warn!(
            "Range localization attempt {} found {} edges, retrying",
            self.attempt,
            edges
        );
        self.phase = RangePhase::RotateSearching;
        self.zones.reset();
        self.sweep_start = self.unwrapped;
        self.armed_at = None;
        self.falling = None;
        self.rising = None;
        self.refined_rising = None;
        self.refined_falling = None;
        Ok(())
    }

    fn send(&self, command: MotorCommand) -> Result<()> {
        self.motors.set_speeds(command.left, command.right)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_tracker_needs_confirmation() {
        let mut zones = ZoneTracker::new(50.0, 4.0);
        assert_eq!(zones.update(200.0, 0.0), None);
        assert_eq!(zones.zone, Some(Zone::Open));
        // A single short reading is not an edge
        assert_eq!(zones.update(20.0, 1.0), None);
        assert_eq!(zones.update(200.0, 2.0), None);
        assert_eq!(zones.update(20.0, 3.0), None);
        assert_eq!(zones.update(20.0, 4.0), Some((Zone::Wall, 3.0)));
    }

    #[test]
    fn test_zone_tracker_hysteresis_band_holds() {
        let mut zones = ZoneTracker::new(50.0, 4.0);
        zones.update(20.0, 0.0);
        assert_eq!(zones.update(52.0, 1.0), None);
        assert_eq!(zones.update(52.0, 2.0), None);
        assert_eq!(zones.zone, Some(Zone::Wall));
        assert_eq!(zones.update(f64::INFINITY, 3.0), None);
        assert_eq!(zones.update(f64::INFINITY, 4.0), Some((Zone::Open, 3.0)));
    }
}
