//! Rotate-then-drive waypoint controller.
//!
//! A pure state machine: given the current pose it returns the wheel speeds
//! for this tick. It never touches hardware, so the navigator thread and
//! lockstep tests drive it the same way.
//!
//! ```text
//!            set_goal                 |err| <= tol
//!   Idle ──────────────► Rotating ───────────────► Translating
//!    ▲                      ▲                          │
//!    │                      └──── |err| > hysteresis ──┤
//!    │                                                 │ dist < tol
//!    │          |heading err| <= tol                   ▼
//!    └──────────────────────────────────────────── Aligning (final heading only)
//! ```

use crate::config::NavigationConfig;
use crate::kinematics::Kinematics;
use crate::shared::Pose;
use crate::utils::{angle_diff, normalize_degrees};

/// Travel target, optionally with a final heading
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub heading: Option<f64>,
}

impl Waypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, heading: None }
    }

    pub fn with_heading(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: Some(normalize_degrees(heading)),
        }
    }
}

/// What the controller is working towards
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Goal {
    Travel(Waypoint),
    /// Rotate in place to a heading
    Turn(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Rotating,
    Translating,
    /// At the position, turning to the requested final heading
    Aligning,
}

/// Signed wheel speeds in deg/s
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorCommand {
    pub left: f64,
    pub right: f64,
}

impl MotorCommand {
    pub const STOP: Self = Self {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Equal and opposite wheel speeds for an in-place turn.
///
/// Positive `error` (degrees) turns counter-clockwise. Speed is
/// proportional to the error, clamped to `[min_speed, max_speed]`.
pub fn spin_command(error: f64, gain: f64, min_speed: f64, max_speed: f64) -> MotorCommand {
    let speed = (gain * error.abs()).clamp(min_speed.min(max_speed), max_speed);
    let w = speed.copysign(error);
    MotorCommand::new(-w, w)
}

/// Waypoint controller
pub struct NavController {
    config: NavigationConfig,
    kinematics: Kinematics,
    goal: Option<Goal>,
    state: NavState,
}

impl NavController {
    pub fn new(config: NavigationConfig, kinematics: Kinematics) -> Self {
        Self {
            config,
            kinematics,
            goal: None,
            state: NavState::Idle,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn goal(&self) -> Option<Goal> {
        self.goal
    }

    pub fn is_idle(&self) -> bool {
        self.state == NavState::Idle
    }

    /// Replace any current goal. Takes effect on the next step.
    pub fn set_goal(&mut self, goal: Goal) {
        log::debug!("Controller goal: {:?}", goal);
        self.goal = Some(goal);
        self.transition(match goal {
            Goal::Travel(_) => NavState::Rotating,
            Goal::Turn(_) => NavState::Aligning,
        });
    }

    /// Drop the goal and go idle.
    pub fn cancel(&mut self) {
        self.goal = None;
        self.transition(NavState::Idle);
    }

    /// Compute this tick's wheel speeds.
    pub fn step(&mut self, pose: &Pose) -> MotorCommand {
        let Some(goal) = self.goal else {
            self.transition(NavState::Idle);
            return MotorCommand::STOP;
        };

        match (self.state, goal) {
            (NavState::Idle, _) => MotorCommand::STOP,
            (NavState::Aligning, Goal::Turn(heading)) => self.align(pose, heading),
            (NavState::Aligning, Goal::Travel(waypoint)) => match waypoint.heading {
                Some(heading) => self.align(pose, heading),
                None => self.finish(),
            },
            (NavState::Rotating, Goal::Travel(waypoint)) => self.rotate(pose, &waypoint),
            (NavState::Translating, Goal::Travel(waypoint)) => self.translate(pose, &waypoint),
            (_, Goal::Turn(heading)) => {
                self.transition(NavState::Aligning);
                self.align(pose, heading)
            }
        }
    }

    fn rotate(&mut self, pose: &Pose, waypoint: &Waypoint) -> MotorCommand {
        if pose.distance_to(waypoint.x, waypoint.y) < self.config.distance_tolerance {
            return self.arrive(pose, waypoint);
        }
        let error = angle_diff(pose.bearing_to(waypoint.x, waypoint.y), pose.heading);
        if error.abs() <= self.config.rotate_tolerance_deg {
            self.transition(NavState::Translating);
            return self.translate(pose, waypoint);
        }
        self.spin(error)
    }

    fn translate(&mut self, pose: &Pose, waypoint: &Waypoint) -> MotorCommand {
        let distance = pose.distance_to(waypoint.x, waypoint.y);
        if distance < self.config.distance_tolerance {
            return self.arrive(pose, waypoint);
        }
        let error = angle_diff(pose.bearing_to(waypoint.x, waypoint.y), pose.heading);
        if error.abs() > self.config.hysteresis_deg {
            self.transition(NavState::Rotating);
            return self.spin(error);
        }

        // Ramp down over the last approach_distance
        let ramp = (distance / self.config.approach_distance).min(1.0);
        let speed = (self.config.cruise_speed * ramp)
            .max(self.config.min_drive_speed.min(self.config.cruise_speed));
        let steer = (self.config.steering_gain * error).clamp(-speed, speed);
        MotorCommand::new(
            self.kinematics.clamp_speed(speed - steer),
            self.kinematics.clamp_speed(speed + steer),
        )
    }

    fn arrive(&mut self, pose: &Pose, waypoint: &Waypoint) -> MotorCommand {
        match waypoint.heading {
            Some(heading) => {
                self.transition(NavState::Aligning);
                self.align(pose, heading)
            }
            None => self.finish(),
        }
    }

    fn align(&mut self, pose: &Pose, heading: f64) -> MotorCommand {
        let error = angle_diff(heading, pose.heading);
        if error.abs() <= self.config.rotate_tolerance_deg {
            return self.finish();
        }
        self.spin(error)
    }

    fn spin(&self, error: f64) -> MotorCommand {
        let command = spin_command(
            error,
            self.config.turn_gain,
            self.config.min_rotate_speed,
            self.config.rotate_speed,
        );
        MotorCommand::new(
            self.kinematics.clamp_speed(command.left),
            self.kinematics.clamp_speed(command.right),
        )
    }

    fn finish(&mut self) -> MotorCommand {
        if let Some(goal) = self.goal.take() {
            log::debug!("Controller reached {:?}", goal);
        }
        self.transition(NavState::Idle);
        MotorCommand::STOP
    }

    fn transition(&mut self, next: NavState) {
        if self.state != next {
            log::debug!("Navigation state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> NavController {
        NavController::new(NavigationConfig::default(), Kinematics::default())
    }

    #[test]
    fn test_idle_without_goal() {
        let mut nav = controller();
        assert_eq!(nav.step(&Pose::default()), MotorCommand::STOP);
        assert!(nav.is_idle());
    }

    #[test]
    fn test_large_error_rotates_in_place() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::new(-50.0, 0.0)));
        // Target is at bearing 90, robot faces 0: turn CCW
        let cmd = nav.step(&Pose::new(0.0, 0.0, 0.0));
        assert_eq!(nav.state(), NavState::Rotating);
        assert_eq!(cmd.left, -cmd.right);
        assert!(cmd.right > 0.0);
    }

    #[test]
    fn test_small_error_translates_with_steering() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::new(-1.0, 50.0)));
        let cmd = nav.step(&Pose::new(0.0, 0.0, 0.0));
        assert_eq!(nav.state(), NavState::Translating);
        // Target slightly left: right wheel faster
        assert!(cmd.left > 0.0 && cmd.right > cmd.left);
    }

    #[test]
    fn test_hysteresis_band_keeps_translating() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::new(0.0, 100.0)));
        nav.step(&Pose::new(0.0, 0.0, 0.0));
        assert_eq!(nav.state(), NavState::Translating);

        // 8 degrees off: above rotate tolerance, below hysteresis
        nav.step(&Pose::new(0.0, 0.0, 8.0));
        assert_eq!(nav.state(), NavState::Translating);

        nav.step(&Pose::new(0.0, 0.0, 20.0));
        assert_eq!(nav.state(), NavState::Rotating);
    }

    #[test]
    fn test_arrival_stops_and_idles() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::new(10.0, 10.0)));
        let cmd = nav.step(&Pose::new(10.2, 9.8, 123.0));
        assert!(cmd.is_stop());
        assert!(nav.is_idle());
        assert!(nav.goal().is_none());
    }

    #[test]
    fn test_final_heading_aligns_before_idle() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::with_heading(0.0, 0.0, 270.0)));
        let cmd = nav.step(&Pose::new(0.0, 0.0, 0.0));
        assert_eq!(nav.state(), NavState::Aligning);
        // Shortest way to 270 from 0 is clockwise
        assert!(cmd.left > 0.0 && cmd.right < 0.0);

        let cmd = nav.step(&Pose::new(0.0, 0.0, 271.0));
        assert!(cmd.is_stop());
        assert!(nav.is_idle());
    }

    #[test]
    fn test_turn_goal() {
        let mut nav = controller();
        nav.set_goal(Goal::Turn(90.0));
        assert_eq!(nav.state(), NavState::Aligning);
        let cmd = nav.step(&Pose::new(3.0, 4.0, 10.0));
        assert!(cmd.right > 0.0);
        assert!(nav.step(&Pose::new(3.0, 4.0, 89.0)).is_stop());
    }

    #[test]
    fn test_new_goal_preempts() {
        let mut nav = controller();
        nav.set_goal(Goal::Travel(Waypoint::new(0.0, 100.0)));
        nav.step(&Pose::new(0.0, 0.0, 0.0));
        nav.set_goal(Goal::Travel(Waypoint::new(0.0, -100.0)));
        assert_eq!(nav.state(), NavState::Rotating);
        assert_eq!(nav.goal(), Some(Goal::Travel(Waypoint::new(0.0, -100.0))));
        let cmd = nav.step(&Pose::new(0.0, 10.0, 0.0));
        assert_eq!(cmd.left, -cmd.right);
    }

    #[test]
    fn test_spin_command_bounds() {
        let cmd = spin_command(0.1, 6.0, 30.0, 180.0);
        assert_eq!(cmd, MotorCommand::new(-30.0, 30.0));
        let cmd = spin_command(-170.0, 6.0, 30.0, 180.0);
        assert_eq!(cmd, MotorCommand::new(180.0, -180.0));
    }
}
