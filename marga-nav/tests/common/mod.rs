//! Lockstep test rig: the real components against a simulated robot.
//!
//! One rig tick advances the world by two 5 ms physics steps, then runs the
//! odometer, so every component under test sees a fresh pose each 10 ms tick
//! without any threads involved.

#![allow(dead_code)]

use marga_io::devices::mock;
use marga_io::{DeviceHandles, SharedSimRobot, SimRobot, SimulationConfig, TruePose};
use marga_nav::kinematics::Kinematics;
use marga_nav::odometer::Odometer;
use marga_nav::shared::{Pose, SharedPose};

/// Seconds per rig tick
pub const TICK: f64 = 0.01;
const SUBSTEPS: usize = 2;
/// Seconds per physics step
pub const STEP: f64 = TICK / SUBSTEPS as f64;

pub struct Rig {
    pub robot: SharedSimRobot,
    pub handles: DeviceHandles,
    pub pose: SharedPose,
    pub kinematics: Kinematics,
    odometer: Odometer,
}

impl Rig {
    /// Rig with the estimator at the origin, whatever the true start pose.
    pub fn new(sim: SimulationConfig) -> Self {
        let robot = SimRobot::shared(sim);
        let handles = mock::handles(&robot);
        let pose = SharedPose::default();
        let kinematics = Kinematics::default();
        let mut odometer = Odometer::new(kinematics, handles.encoders.clone(), pose.clone());
        odometer.tick().unwrap();
        Self {
            robot,
            handles,
            pose,
            kinematics,
            odometer,
        }
    }

    /// Rig whose estimate starts at the true pose.
    pub fn at_truth(sim: SimulationConfig) -> Self {
        let rig = Self::new(sim);
        let truth = rig.truth();
        rig.pose.set(truth.x, truth.y, truth.heading);
        rig
    }

    /// Advance the world one tick and integrate the wheel motion.
    pub fn tick(&mut self) -> Pose {
        self.tick_steps(SUBSTEPS)
    }

    /// Advance the world by `steps` physics steps before the odometer runs,
    /// as a late or early periodic tick would.
    pub fn tick_steps(&mut self, steps: usize) -> Pose {
        {
            let mut robot = self.robot.lock();
            for _ in 0..steps {
                robot.step(STEP);
            }
        }
        self.odometer.tick().unwrap()
    }

    pub fn truth(&self) -> TruePose {
        self.robot.lock().true_pose()
    }

    pub fn command(&self, left: f64, right: f64) {
        self.handles.motors.set_speeds(left, right).unwrap();
    }

    /// Euclidean distance between the estimate and the true position
    pub fn position_error(&self) -> f64 {
        let estimate = self.pose.get();
        let truth = self.truth();
        (estimate.x - truth.x).hypot(estimate.y - truth.y)
    }
}

/// Simulation with every noise source switched off
pub fn quiet_sim() -> SimulationConfig {
    let mut sim = SimulationConfig::default();
    sim.encoder.slip_stddev = 0.0;
    sim.encoder.slip_bias = 0.0;
    sim.line_sensor.noise_stddev = 0.0;
    sim.range_sensor.noise_stddev = 0.0;
    sim
}

/// Quiet simulation starting at the given true pose
pub fn sim_at(x: f64, y: f64, heading: f64) -> SimulationConfig {
    let mut sim = quiet_sim();
    sim.start_x = x;
    sim.start_y = y;
    sim.start_heading = heading;
    sim
}

/// Signed heading difference in degrees, (-180, 180]
pub fn heading_error(a: f64, b: f64) -> f64 {
    marga_nav::utils::angle_diff(a, b)
}
