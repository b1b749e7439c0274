//! Differential drive kinematics for the simulated robot
//!
//! Headings are degrees counter-clockwise from +y, so the forward unit
//! vector is (-sin θ, cos θ). Wheel speeds are motor-degrees per second.

use super::config::{ArenaConfig, SimRobotConfig};

/// True pose of the simulated robot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruePose {
    /// cm
    pub x: f64,
    /// cm
    pub y: f64,
    /// Degrees in [0, 360)
    pub heading: f64,
}

/// Physics state advanced by wheel speed commands
pub struct PhysicsState {
    pose: TruePose,
    /// Set when the last step was clipped by a wall
    collided: bool,
}

impl PhysicsState {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            pose: TruePose {
                x,
                y,
                heading: wrap_degrees(heading),
            },
            collided: false,
        }
    }

    #[inline]
    pub fn pose(&self) -> TruePose {
        self.pose
    }

    #[inline]
    pub fn collided(&self) -> bool {
        self.collided
    }

    /// Teleport, used by tests to stage a scenario.
    pub fn set_pose(&mut self, x: f64, y: f64, heading: f64) {
        self.pose = TruePose {
            x,
            y,
            heading: wrap_degrees(heading),
        };
    }

    /// Advance by `dt` seconds with the given wheel speeds (deg/s).
    ///
    /// Returns the wheel rotations (deg) actually applied, after clamping
    /// to the motor speed limit.
    pub fn step(
        &mut self,
        dt: f64,
        left_speed: f64,
        right_speed: f64,
        robot: &SimRobotConfig,
        arena: &ArenaConfig,
    ) -> (f64, f64) {
        let limit = robot.max_wheel_speed;
        let left_deg = left_speed.clamp(-limit, limit) * dt;
        let right_deg = right_speed.clamp(-limit, limit) * dt;

        let left_cm = left_deg.to_radians() * robot.wheel_radius;
        let right_cm = right_deg.to_radians() * robot.wheel_radius;
        let distance = (left_cm + right_cm) / 2.0;
        let dtheta = (right_cm - left_cm) / robot.track;

        let theta = self.pose.heading.to_radians();
        let new_theta = theta + dtheta;

        let (dx, dy) = if dtheta.abs() < 1e-9 {
            (-distance * theta.sin(), distance * theta.cos())
        } else {
            // Exact arc around the instantaneous centre of rotation
            let r = distance / dtheta;
            (r * (new_theta.cos() - theta.cos()), r * (new_theta.sin() - theta.sin()))
        };

        let new_x = self.pose.x + dx;
        let new_y = self.pose.y + dy;
        let clamped_x = new_x.clamp(arena.min_x, arena.max_x);
        let clamped_y = new_y.clamp(arena.min_y, arena.max_y);
        self.collided = clamped_x != new_x || clamped_y != new_y;

        self.pose = TruePose {
            x: clamped_x,
            y: clamped_y,
            heading: wrap_degrees(new_theta.to_degrees()),
        };
        (left_deg, right_deg)
    }

    /// World position of a point mounted `forward`/`left` of the turning centre.
    pub fn mount_point(&self, forward: f64, left: f64) -> (f64, f64) {
        let theta = self.pose.heading.to_radians();
        let (s, c) = theta.sin_cos();
        (
            self.pose.x - forward * s - left * c,
            self.pose.y + forward * c - left * s,
        )
    }
}

/// Wrap to [0, 360)
pub fn wrap_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
