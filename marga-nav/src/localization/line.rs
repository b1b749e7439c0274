//! Line-based position calibration.
//!
//! Runs after the range localizer has fixed the heading. The robot starts in
//! the tile below and left of the target intersection. For each axis it
//! turns to a canonical heading, drives until the line sensor crosses the
//! target line, backs off until the sensor is clear again and creeps forward
//! onto the line a second time. The slow second crossing is the reference:
//! the sensor is then at the near edge of the line, which fixes one
//! coordinate of the robot centre exactly.
//!
//! ```text
//!  per axis (Y at heading 0, then X at heading 270):
//!  Turning ──► Approaching ──► BackingOff ──► Creeping ──► snap
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use marga_io::{DriveMotors, LineSensor};

use crate::config::{GridConfig, LineLocalizerConfig};
use crate::correction::{Axis, LineDetector};
use crate::error::{MargaError, Result};
use crate::kinematics::Kinematics;
use crate::navigation::{MotorCommand, spin_command};
use crate::shared::{Pose, SharedPose};
use crate::utils::angle_diff;

/// Heading error at which a turn is done (degrees)
const TURN_TOLERANCE: f64 = 0.5;
const TURN_GAIN: f64 = 3.0;
const TURN_MIN_SPEED: f64 = 15.0;
/// Differential wheel speed per degree of heading error while driving
const HOLD_GAIN: f64 = 4.0;
/// Clear samples needed before the back-off counts as off the line
const CLEAR_SAMPLES: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinePhase {
    Turning(Axis),
    Approaching(Axis),
    BackingOff(Axis),
    Creeping(Axis),
    Done,
}

impl Axis {
    /// Heading that drives across the lines constraining this axis
    fn approach_heading(self) -> f64 {
        match self {
            Axis::Y => 0.0,
            Axis::X => 270.0,
        }
    }
}

/// One-shot position calibration against a grid intersection
pub struct LineLocalizer {
    config: LineLocalizerConfig,
    grid: GridConfig,
    kinematics: Kinematics,
    sensor: Arc<dyn LineSensor>,
    motors: Arc<dyn DriveMotors>,
    pose: SharedPose,
    detector: LineDetector,
    phase: LinePhase,
    /// Pose where the current leg started
    leg_start: Pose,
    clear_samples: u32,
}

impl LineLocalizer {
    pub fn new(
        config: LineLocalizerConfig,
        grid: GridConfig,
        kinematics: Kinematics,
        detector: LineDetector,
        sensor: Arc<dyn LineSensor>,
        motors: Arc<dyn DriveMotors>,
        pose: SharedPose,
    ) -> Self {
        let leg_start = pose.get();
        Self {
            config,
            grid,
            kinematics,
            sensor,
            motors,
            pose,
            detector,
            phase: LinePhase::Turning(Axis::Y),
            leg_start,
            clear_samples: 0,
        }
    }

    pub fn phase(&self) -> LinePhase {
        self.phase
    }

    /// Advance one tick. Returns the seeded pose once both axes are fixed.
    pub fn tick(&mut self) -> Result<Option<Pose>> {
        let intensity = self.sensor.intensity()?;
        let crossing = self.detector.push(intensity);
        let pose = self.pose.get();

        match self.phase {
            LinePhase::Turning(axis) => {
                let error = angle_diff(axis.approach_heading(), pose.heading);
                if error.abs() <= TURN_TOLERANCE {
                    self.send(MotorCommand::STOP)?;
                    self.begin_leg(LinePhase::Approaching(axis), pose);
                } else {
                    self.send(spin_command(
                        error,
                        TURN_GAIN,
                        TURN_MIN_SPEED,
                        self.config.rotate_speed,
                    ))?;
                }
            }
            LinePhase::Approaching(axis) => {
                if crossing {
                    log::debug!("{:?} line found at {:?}", axis, pose);
                    self.send(MotorCommand::STOP)?;
                    self.clear_samples = 0;
                    self.begin_leg(LinePhase::BackingOff(axis), pose);
                    return Ok(None);
                }
                let travel = pose.distance_to(self.leg_start.x, self.leg_start.y);
                if travel > self.config.capture_distance {
                    return self.fail(format!(
                        "no {:?} line within {:.1} cm of the start",
                        axis, self.config.capture_distance
                    ));
                }
                self.drive(axis, &pose, self.config.approach_speed)?;
            }
            LinePhase::BackingOff(axis) => {
                if self.detector.on_line() {
                    self.clear_samples = 0;
                } else {
                    self.clear_samples += 1;
                }
                if self.clear_samples >= CLEAR_SAMPLES {
                    self.send(MotorCommand::STOP)?;
                    // The slow pass must not be swallowed by the fast pass cooldown
                    self.detector.reset_cooldown();
                    self.begin_leg(LinePhase::Creeping(axis), pose);
                    return Ok(None);
                }
                let travel = pose.distance_to(self.leg_start.x, self.leg_start.y);
                if travel > self.config.backoff_limit {
                    return self.fail(format!(
                        "still on the {:?} line after backing off {:.1} cm",
                        axis, travel
                    ));
                }
                self.drive(axis, &pose, -self.config.creep_speed)?;
            }
            LinePhase::Creeping(axis) => {
                if crossing {
                    self.send(MotorCommand::STOP)?;
                    let snapped = self.snap(axis);
                    return Ok(match axis {
                        Axis::Y => {
                            self.begin_leg(LinePhase::Turning(Axis::X), snapped);
                            None
                        }
                        Axis::X => {
                            self.phase = LinePhase::Done;
                            self.pose.set(snapped.x, snapped.y, snapped.heading);
                            let seeded = self.pose.get();
                            log::info!("Line localization done at {:?}", seeded);
                            Some(seeded)
                        }
                    });
                }
                let travel = pose.distance_to(self.leg_start.x, self.leg_start.y);
                if travel > 2.0 * self.config.backoff_limit {
                    return self.fail(format!(
                        "{:?} line lost during the slow pass ({:.1} cm)",
                        axis, travel
                    ));
                }
                self.drive(axis, &pose, self.config.creep_speed)?;
            }
            LinePhase::Done => {}
        }
        Ok(None)
    }

    /// Run to completion at the configured period.
    pub fn run(&mut self, running: &AtomicBool) -> Result<Pose> {
        log::info!(
            "Line localization started, target ({:.2}, {:.2})",
            self.config.target_x,
            self.config.target_y
        );
        let ticker = crossbeam_channel::tick(self.config.period());
        loop {
            if ticker.recv().is_err() || !running.load(Ordering::Relaxed) {
                self.send(MotorCommand::STOP)?;
                return Err(MargaError::Interrupted);
            }
            match self.tick() {
                Ok(Some(pose)) => return Ok(pose),
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

    fn begin_leg(&mut self, phase: LinePhase, pose: Pose) {
        log::debug!("Line localizer {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.leg_start = pose;
    }

    /// Straight drive along the axis heading; negative speed reverses.
    fn drive(&self, axis: Axis, pose: &Pose, speed: f64) -> Result<()> {
        let error = angle_diff(axis.approach_heading(), pose.heading);
        let steer = (HOLD_GAIN * error).clamp(-speed.abs(), speed.abs());
        self.send(MotorCommand::new(
            self.kinematics.clamp_speed(speed - steer),
            self.kinematics.clamp_speed(speed + steer),
        ))
    }

    /// Put the sensor on the near edge of the target line and square the heading.
    fn snap(&self, axis: Axis) -> Pose {
        let heading = axis.approach_heading();
        let half_width = self.grid.line_width / 2.0;
        self.pose.update_with(|pose| {
            let before = *pose;
            let (mut sx, mut sy) = self
                .kinematics
                .sensor_position(&Pose::new(pose.x, pose.y, heading));
            // Sensor darkens at the near edge of the line
            match axis {
                Axis::Y => sy = self.config.target_y - half_width,
                Axis::X => sx = self.config.target_x - half_width,
            }
            let (x, y) = self.kinematics.center_for_sensor(sx, sy, heading);
            pose.x = x;
            pose.y = y;
            pose.heading = heading;
            log::info!(
                "Snapped {:?} on line: ({:.2}, {:.2}, {:.1}) -> ({:.2}, {:.2}, {:.1})",
                axis,
                before.x,
                before.y,
                before.heading,
                pose.x,
                pose.y,
                pose.heading
            );
        })
    }

    fn fail<T>(&self, reason: String) -> Result<T> {
        log::error!("Line localization failed: {}", reason);
        self.send(MotorCommand::STOP)?;
        Err(MargaError::Localization(reason))
    }

    fn send(&self, command: MotorCommand) -> Result<()> {
        self.motors.set_speeds(command.left, command.right)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;

    /// Motors that record the last command
    #[derive(Default)]
    struct RecordingMotors(Mutex<(f64, f64)>);

    impl DriveMotors for RecordingMotors {
        fn set_speeds(&self, left: f64, right: f64) -> marga_io::Result<()> {
            *self.0.lock() = (left, right);
            Ok(())
        }
    }

    struct FloorSensor;

    impl LineSensor for FloorSensor {
        fn intensity(&self) -> marga_io::Result<f32> {
            Ok(0.55)
        }
    }

    fn localizer(pose: Pose) -> (LineLocalizer, SharedPose, Arc<RecordingMotors>) {
        let shared = SharedPose::new(pose);
        let motors = Arc::new(RecordingMotors::default());
        let localizer = LineLocalizer::new(
            LineLocalizerConfig::default(),
            GridConfig::default(),
            Kinematics::default(),
            LineDetector::new(4, 0.15, 30),
            Arc::new(FloorSensor),
            motors.clone(),
            shared.clone(),
        );
        (localizer, shared, motors)
    }

    #[test]
    fn test_turns_to_zero_first() {
        let (mut localizer, _, motors) = localizer(Pose::new(0.0, 0.0, 30.0));
        localizer.tick().unwrap();
        assert_eq!(localizer.phase(), LinePhase::Turning(Axis::Y));
        // Clockwise towards 0
        let (left, right) = *motors.0.lock();
        assert!(left > 0.0 && right < 0.0);
    }

    #[test]
    fn test_aligned_robot_starts_approach() {
        let (mut localizer, _, motors) = localizer(Pose::new(0.0, 0.0, 0.2));
        localizer.tick().unwrap();
        assert_eq!(localizer.phase(), LinePhase::Approaching(Axis::Y));
        localizer.tick().unwrap();
        let (left, right) = *motors.0.lock();
        assert!(left > 0.0 && right > 0.0);
    }

    #[test]
    fn test_no_line_within_capture_distance_fails() {
        let (mut localizer, shared, motors) = localizer(Pose::new(0.0, 0.0, 0.0));
        localizer.tick().unwrap();
        shared.set(0.0, 46.0, 0.0);
        let err = localizer.tick().unwrap_err();
        assert!(matches!(err, MargaError::Localization(_)));
        assert_eq!(*motors.0.lock(), (0.0, 0.0));
    }

    #[test]
    fn test_snap_uses_sensor_offset() {
        let (localizer, shared, _) = localizer(Pose::new(3.0, 7.0, 1.0));
        let pose = localizer.snap(Axis::Y);
        // Sensor 10.5 cm behind, line near edge at -0.6
        assert_relative_eq!(pose.y, 9.9, epsilon = 1e-9);
        assert_relative_eq!(pose.x, 3.0, epsilon = 1e-9);
        assert_relative_eq!(pose.heading, 0.0);
        assert_eq!(shared.get(), pose);

        let pose = localizer.snap(Axis::X);
        assert_relative_eq!(pose.x, 9.9, epsilon = 1e-9);
        // The y fix from the first leg survives the turn
        assert_relative_eq!(pose.y, 9.9, epsilon = 1e-9);
        assert_relative_eq!(pose.heading, 270.0);
    }
}
