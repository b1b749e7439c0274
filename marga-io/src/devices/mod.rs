//! Device drivers
//!
//! - [`mock`]: simulated robot for hardware-free development and tests

pub mod mock;

use crate::config::DeviceConfig;
use crate::core::driver::DeviceDriver;
use crate::error::{Error, Result};

/// Create the driver selected by `config.device_type`.
pub fn create_device(config: &DeviceConfig) -> Result<Box<dyn DeviceDriver>> {
    match config.device_type.as_str() {
        "mock" => {
            let simulation = config.simulation.clone().ok_or_else(|| {
                Error::Config("Mock device requires a [device.simulation] section".to_string())
            })?;
            log::info!("Creating mock device: {}", config.name);
            Ok(Box::new(mock::MockDriver::new(simulation)?))
        }
        other => Err(Error::Config(format!("Unknown device type: {}", other))),
    }
}
