//! Mock device driver for hardware-free development
//!
//! Simulates the grid robot on a painted floor inside a walled arena:
//!
//! | Component | Simulation Method |
//! |-----------|-------------------|
//! | Drive motors | Commanded wheel speeds, clamped to the motor limit |
//! | Tachometers | Exact arc kinematics + multiplicative slip noise |
//! | Line sensor | Grid-line lookup at the sensor mount point |
//! | Range sensor | Ray-cast to the arena walls, max range and dropouts |
//!
//! Two ways to drive the simulation:
//!
//! - [`MockDriver`] owns the world and advances it on a `mock-simulation`
//!   thread in (scaled) real time, like a physical robot.
//! - [`handles`] exposes a [`SharedSimRobot`] without any thread so tests can
//!   call [`SimRobot::step`] in lockstep with the components under test.
//!
//! Example configuration:
//!
//! ```toml
//! [device]
//! type = "mock"
//!
//! [device.simulation]
//! start_x = -15.24
//! start_y = -15.24
//! start_heading = 60.0
//! speed_factor = 1.0
//! random_seed = 42      # 0 = random each run
//! ```

pub mod config;
pub mod encoder_sim;
pub mod noise;
pub mod physics;
pub mod sensor_sim;

pub use config::SimulationConfig;
pub use physics::TruePose;

use crate::core::driver::{
    DeviceDriver, DeviceHandles, DriveMotors, LineSensor, RangeSensor, WheelEncoders,
};
use crate::core::types::{RangeReading, TachoCounts};
use crate::error::{Error, Result};
use encoder_sim::EncoderSimulator;
use noise::NoiseGenerator;
use parking_lot::Mutex;
use physics::PhysicsState;
use sensor_sim::{LineSensorSimulator, RangeSensorSimulator};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// ============================================================================
// Simulated world
// ============================================================================

/// The simulated robot and its surroundings
pub struct SimRobot {
    config: SimulationConfig,
    physics: PhysicsState,
    encoders: EncoderSimulator,
    line_sensor: LineSensorSimulator,
    range_sensor: RangeSensorSimulator,
    left_speed: f64,
    right_speed: f64,
    sim_time: f64,
}

/// Simulated robot shared between the simulation loop and device handles
pub type SharedSimRobot = Arc<Mutex<SimRobot>>;

impl SimRobot {
    pub fn new(config: SimulationConfig) -> Self {
        let mut noise = NoiseGenerator::new(config.random_seed);
        Self {
            physics: PhysicsState::new(config.start_x, config.start_y, config.start_heading),
            encoders: EncoderSimulator::new(&config.encoder, noise.fork()),
            line_sensor: LineSensorSimulator::new(&config.line_sensor, noise.fork()),
            range_sensor: RangeSensorSimulator::new(&config.range_sensor, noise.fork()),
            left_speed: 0.0,
            right_speed: 0.0,
            sim_time: 0.0,
            config,
        }
    }

    /// Wrap in the shared form used by [`handles`].
    pub fn shared(config: SimulationConfig) -> SharedSimRobot {
        Arc::new(Mutex::new(Self::new(config)))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Command wheel speeds (deg/s); they hold until the next command.
    pub fn set_speeds(&mut self, left: f64, right: f64) {
        self.left_speed = left;
        self.right_speed = right;
    }

    pub fn commanded_speeds(&self) -> (f64, f64) {
        (self.left_speed, self.right_speed)
    }

    /// Advance the world by `dt` simulated seconds.
    pub fn step(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let (left_deg, right_deg) = self.physics.step(
            dt,
            self.left_speed,
            self.right_speed,
            &self.config.robot,
            &self.config.arena,
        );
        self.encoders.update(left_deg, right_deg);
        self.sim_time += dt;
    }

    pub fn tacho_counts(&self) -> TachoCounts {
        self.encoders.counts()
    }

    pub fn line_intensity(&mut self) -> f32 {
        let robot = &self.config.robot;
        let (x, y) = self
            .physics
            .mount_point(robot.line_sensor_forward, robot.line_sensor_left);
        self.line_sensor.read(x, y, &self.config.arena)
    }

    pub fn range(&mut self) -> RangeReading {
        let (x, y) = self
            .physics
            .mount_point(self.config.robot.range_sensor_forward, 0.0);
        let heading = self.physics.pose().heading;
        self.range_sensor.read(x, y, heading, &self.config.arena)
    }

    /// Ground truth pose, for tests and logging
    pub fn true_pose(&self) -> TruePose {
        self.physics.pose()
    }

    /// Move the robot without touching the tachometers.
    pub fn place(&mut self, x: f64, y: f64, heading: f64) {
        self.physics.set_pose(x, y, heading);
    }

    pub fn collided(&self) -> bool {
        self.physics.collided()
    }

    /// Simulated seconds since creation
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }
}

// ============================================================================
// Component handles
// ============================================================================

struct MockEncoders(SharedSimRobot);
struct MockMotors(SharedSimRobot);
struct MockLineSensor(SharedSimRobot);
struct MockRangeSensor(SharedSimRobot);

impl WheelEncoders for MockEncoders {
    fn tacho_counts(&self) -> Result<TachoCounts> {
        Ok(self.0.lock().tacho_counts())
    }
}

impl DriveMotors for MockMotors {
    fn set_speeds(&self, left: f64, right: f64) -> Result<()> {
        if !left.is_finite() || !right.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "wheel speeds must be finite, got ({}, {})",
                left, right
            )));
        }
        self.0.lock().set_speeds(left, right);
        Ok(())
    }
}

impl LineSensor for MockLineSensor {
    fn intensity(&self) -> Result<f32> {
        Ok(self.0.lock().line_intensity())
    }
}

impl RangeSensor for MockRangeSensor {
    fn distance(&self) -> Result<RangeReading> {
        Ok(self.0.lock().range())
    }
}

/// Device handles over a simulated robot, without a simulation thread.
pub fn handles(robot: &SharedSimRobot) -> DeviceHandles {
    DeviceHandles {
        encoders: Arc::new(MockEncoders(Arc::clone(robot))),
        motors: Arc::new(MockMotors(Arc::clone(robot))),
        line_sensor: Arc::new(MockLineSensor(Arc::clone(robot))),
        range_sensor: Arc::new(MockRangeSensor(Arc::clone(robot))),
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Mock device driver running the simulation on its own thread
pub struct MockDriver {
    config: SimulationConfig,
    robot: SharedSimRobot,
    shutdown: Arc<AtomicBool>,
    sim_thread: Option<JoinHandle<()>>,
}

impl MockDriver {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if config.rate_hz <= 0.0 || config.speed_factor <= 0.0 {
            return Err(Error::Config(format!(
                "simulation rate_hz and speed_factor must be positive (got {} and {})",
                config.rate_hz, config.speed_factor
            )));
        }
        if config.robot.wheel_radius <= 0.0 || config.robot.track <= 0.0 {
            return Err(Error::Config(
                "simulated wheel_radius and track must be positive".to_string(),
            ));
        }
        Ok(Self {
            robot: SimRobot::shared(config.clone()),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            sim_thread: None,
        })
    }

    /// The simulated world, for ground-truth inspection.
    pub fn robot(&self) -> SharedSimRobot {
        Arc::clone(&self.robot)
    }

    fn shutdown_all(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.robot.lock().set_speeds(0.0, 0.0);
        if let Some(handle) = self.sim_thread.take() {
            let _ = handle.join();
        }
    }
}

impl DeviceDriver for MockDriver {
    fn initialize(&mut self) -> Result<DeviceHandles> {
        if self.sim_thread.is_none() {
            self.shutdown.store(false, Ordering::Relaxed);
            let robot = Arc::clone(&self.robot);
            let shutdown = Arc::clone(&self.shutdown);
            let rate_hz = self.config.rate_hz;
            let speed_factor = self.config.speed_factor;

            let handle = thread::Builder::new()
                .name("mock-simulation".to_string())
                .spawn(move || simulation_loop(robot, shutdown, rate_hz, speed_factor))
                .map_err(|e| {
                    Error::Device(format!("Failed to spawn simulation thread: {}", e))
                })?;
            self.sim_thread = Some(handle);
        }

        let pose = self.robot.lock().true_pose();
        log::info!(
            "Mock device initialized at ({:.1}, {:.1}) heading {:.1}",
            pose.x,
            pose.y,
            pose.heading
        );
        Ok(handles(&self.robot))
    }

    fn shutdown(&mut self) -> Result<()> {
        log::info!("Mock device shutting down");
        self.shutdown_all();
        Ok(())
    }
}

impl Drop for MockDriver {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

fn simulation_loop(
    robot: SharedSimRobot,
    shutdown: Arc<AtomicBool>,
    rate_hz: f64,
    speed_factor: f64,
) {
    let interval = Duration::from_secs_f64(1.0 / rate_hz);
    let mut last_time = Instant::now();

    log::info!(
        "Simulation loop started: rate={}Hz, speed_factor={}",
        rate_hz,
        speed_factor
    );

    while !shutdown.load(Ordering::Relaxed) {
        let loop_start = Instant::now();
        let sim_dt = loop_start.duration_since(last_time).as_secs_f64() * speed_factor;
        last_time = loop_start;

        {
            let mut robot = robot.lock();
            robot.step(sim_dt);
            if robot.collided() {
                let pose = robot.true_pose();
                log::debug!("Collision at ({:.1}, {:.1})", pose.x, pose.y);
            }
        }

        let elapsed = loop_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }

    log::info!("Simulation loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.encoder.slip_stddev = 0.0;
        config.line_sensor.noise_stddev = 0.0;
        config.range_sensor.noise_stddev = 0.0;
        config
    }

    #[test]
    fn test_handles_share_one_world() {
        let robot = SimRobot::shared(quiet_config());
        let devices = handles(&robot);
        devices.motors.set_speeds(90.0, 90.0).unwrap();
        robot.lock().step(1.0);
        let counts = devices.encoders.tacho_counts().unwrap();
        assert_eq!(counts, TachoCounts::new(90, 90));
        devices.motors.stop().unwrap();
        assert_eq!(robot.lock().commanded_speeds(), (0.0, 0.0));
    }

    #[test]
    fn test_non_finite_speed_rejected() {
        let robot = SimRobot::shared(quiet_config());
        let devices = handles(&robot);
        assert!(devices.motors.set_speeds(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_range_sees_corner_walls() {
        let robot = SimRobot::shared(quiet_config());
        robot.lock().place(-15.24, -15.24, 90.0);
        let devices = handles(&robot);
        let reading = devices.range_sensor.distance().unwrap();
        assert!(matches!(reading, RangeReading::Echo(d) if (d - 15.24).abs() < 1e-3));
    }

    #[test]
    fn test_driver_rejects_bad_rate() {
        let config = SimulationConfig {
            rate_hz: 0.0,
            ..SimulationConfig::default()
        };
        assert!(matches!(MockDriver::new(config), Err(Error::Config(_))));
    }
}
