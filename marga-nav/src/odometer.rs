//! Wheel tachometer odometry
//!
//! Turns cumulative tacho counts into per-tick [`WheelSample`]s and folds
//! them into the shared pose with first-order Euler integration: x and y
//! advance along the heading held at the start of the tick.

use std::sync::Arc;

use marga_io::{TachoCounts, WheelEncoders};

use crate::error::Result;
use crate::kinematics::Kinematics;
use crate::shared::{Pose, SharedPose};

/// Incremental wheel rotation since the previous tick, in motor-degrees
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelSample {
    pub left: f64,
    pub right: f64,
}

impl WheelSample {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Difference between two cumulative readings
    pub fn between(previous: TachoCounts, current: TachoCounts) -> Self {
        Self {
            left: (current.left - previous.left) as f64,
            right: (current.right - previous.right) as f64,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Apply one wheel sample to a pose.
pub fn integrate(pose: &mut Pose, sample: WheelSample, kinematics: &Kinematics) {
    let left = kinematics.wheel_travel(sample.left);
    let right = kinematics.wheel_travel(sample.right);
    let distance = (left + right) / 2.0;
    let dtheta = ((right - left) / kinematics.track).to_degrees();

    let (ux, uy) = pose.forward();
    pose.x += distance * ux;
    pose.y += distance * uy;
    pose.heading += dtheta;
}

/// Pose estimator fed by the wheel tachometers
pub struct Odometer {
    kinematics: Kinematics,
    encoders: Arc<dyn WheelEncoders>,
    pose: SharedPose,
    /// Counts seen at the previous tick
    last_counts: Option<TachoCounts>,
}

impl Odometer {
    pub fn new(kinematics: Kinematics, encoders: Arc<dyn WheelEncoders>, pose: SharedPose) -> Self {
        Self {
            kinematics,
            encoders,
            pose,
            last_counts: None,
        }
    }

    /// Read the tachometers and integrate the change since the last tick.
    ///
    /// The first tick only records a baseline. Each count difference is
    /// consumed exactly once, so a late tick integrates everything it
    /// missed in one step instead of dropping it.
    pub fn tick(&mut self) -> Result<Pose> {
        let counts = self.encoders.tacho_counts()?;
        let Some(previous) = self.last_counts.replace(counts) else {
            log::debug!("Odometer baseline: {:?}", counts);
            return Ok(self.pose.get());
        };
        let sample = WheelSample::between(previous, counts);
        if sample.is_zero() {
            return Ok(self.pose.get());
        }
        Ok(self.update(sample))
    }

    /// Integrate one sample into the shared pose.
    pub fn update(&self, sample: WheelSample) -> Pose {
        let kinematics = self.kinematics;
        self.pose
            .update_with(|pose| integrate(pose, sample, &kinematics))
    }

    pub fn get_pose(&self) -> Pose {
        self.pose.get()
    }

    /// Overwrite the pose, used by the localizers to seed absolute position.
    pub fn set_pose(&self, x: f64, y: f64, heading: f64) {
        log::info!("Pose seeded to ({:.2}, {:.2}, {:.2})", x, y, heading);
        self.pose.set(x, y, heading);
    }

    pub fn shared_pose(&self) -> SharedPose {
        self.pose.clone()
    }
}
