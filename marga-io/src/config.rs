//! Device configuration
//!
//! The `[device]` table of the application config selects a driver and
//! carries its driver-specific section.

use crate::devices::mock::config::SimulationConfig;
use serde::{Deserialize, Serialize};

/// Device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Driver type ("mock")
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,

    /// Human readable device name for logs
    #[serde(default = "default_device_name")]
    pub name: String,

    /// Simulation parameters (required by the mock driver)
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

fn default_device_type() -> String {
    "mock".to_string()
}

fn default_device_name() -> String {
    "Simulated grid robot".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            name: default_device_name(),
            simulation: Some(SimulationConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_table_deserialization() {
        let toml_content = r#"
type = "mock"
name = "Bench robot"

[simulation]
start_x = -12.0
start_y = -18.0
start_heading = 40.0
random_seed = 7
"#;
        let config: DeviceConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.device_type, "mock");
        assert_eq!(config.name, "Bench robot");
        let sim = config.simulation.unwrap();
        assert_eq!(sim.start_x, -12.0);
        assert_eq!(sim.random_seed, 7);
        // Unspecified sections keep their defaults
        assert_eq!(sim.robot.wheel_radius, 2.18);
    }

    #[test]
    fn test_missing_simulation_section() {
        let config: DeviceConfig = toml::from_str("type = \"mock\"").unwrap();
        assert!(config.simulation.is_none());
    }
}
