//! MargaIO - Hardware abstraction for the Marga grid robot
//!
//! This library defines the seam between the navigation core and the robot
//! hardware: two drive motors with tachometers, a downward line sensor and a
//! forward range sensor. It also ships a simulated device so the navigation
//! stack can run without a physical robot.
//!
//! ## Devices
//!
//! - `mock`: Simulated robot on a gridded floor inside a walled arena

pub mod config;
pub mod core;
pub mod devices;
pub mod error;

// Re-export commonly used types
pub use config::DeviceConfig;
pub use core::driver::{
    DeviceDriver, DeviceHandles, DriveMotors, LineSensor, RangeSensor, WheelEncoders,
};
pub use devices::mock::{MockDriver, SharedSimRobot, SimRobot, SimulationConfig, TruePose};
pub use core::types::{RangeReading, TachoCounts};
pub use devices::create_device;
pub use error::{Error, Result};
