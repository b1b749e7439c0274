//! Kinematic constants and robot-frame conversions

use crate::config::RobotConfig;
use crate::shared::Pose;

/// Immutable kinematic description of the robot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    /// cm
    pub wheel_radius: f64,
    /// cm between wheel contact points
    pub track: f64,
    /// Line sensor offset (forward, left) in cm
    pub line_sensor: (f64, f64),
    /// deg/s
    pub max_wheel_speed: f64,
}

impl Kinematics {
    pub fn from_config(config: &RobotConfig) -> Self {
        Self {
            wheel_radius: config.wheel_radius,
            track: config.track,
            line_sensor: (config.line_sensor_forward, config.line_sensor_left),
            max_wheel_speed: config.max_wheel_speed,
        }
    }

    /// Linear travel (cm) for a wheel rotation in motor-degrees.
    #[inline]
    pub fn wheel_travel(&self, degrees: f64) -> f64 {
        degrees.to_radians() * self.wheel_radius
    }

    /// Wheel rotation (motor-degrees) for a linear travel in cm.
    #[inline]
    pub fn wheel_degrees(&self, travel_cm: f64) -> f64 {
        (travel_cm / self.wheel_radius).to_degrees()
    }

    /// World position of the line sensor for a robot at `pose`.
    pub fn sensor_position(&self, pose: &Pose) -> (f64, f64) {
        let (forward, left) = self.line_sensor;
        let (ux, uy) = pose.forward();
        let (vx, vy) = pose.left();
        (
            pose.x + forward * ux + left * vx,
            pose.y + forward * uy + left * vy,
        )
    }

    /// Robot centre that places the line sensor at (`sx`, `sy`) with `heading`.
    pub fn center_for_sensor(&self, sx: f64, sy: f64, heading: f64) -> (f64, f64) {
        let at_origin = self.sensor_position(&Pose::new(0.0, 0.0, heading));
        (sx - at_origin.0, sy - at_origin.1)
    }

    /// Clamp a wheel speed to the motor limit.
    #[inline]
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        speed.clamp(-self.max_wheel_speed, self.max_wheel_speed)
    }
}

impl Default for Kinematics {
    fn default() -> Self {
        Self::from_config(&RobotConfig::default())
    }
}
