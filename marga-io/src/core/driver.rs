//! DeviceDriver trait and per-component hardware traits
//!
//! Components take `&self`: handles are shared between the periodic
//! processes of the navigation core, so implementations use interior
//! mutability (atomics or a lock around the device state).

use crate::core::types::{RangeReading, TachoCounts};
use crate::error::Result;
use std::sync::Arc;

/// Drive wheel tachometers.
pub trait WheelEncoders: Send + Sync {
    /// Read cumulative rotation of both drive wheels.
    fn tacho_counts(&self) -> Result<TachoCounts>;
}

/// The two drive motors.
pub trait DriveMotors: Send + Sync {
    /// Command wheel speeds in motor-degrees per second (signed, forward positive).
    fn set_speeds(&self, left: f64, right: f64) -> Result<()>;

    /// Stop both wheels.
    fn stop(&self) -> Result<()> {
        self.set_speeds(0.0, 0.0)
    }
}

/// Downward-facing reflected-light sensor.
pub trait LineSensor: Send + Sync {
    /// Reflected light intensity in [0, 1]. Grid lines read darker than the floor.
    fn intensity(&self) -> Result<f32>;
}

/// Forward-facing range sensor.
pub trait RangeSensor: Send + Sync {
    fn distance(&self) -> Result<RangeReading>;
}

/// Shared handles to every component the navigation core needs.
#[derive(Clone)]
pub struct DeviceHandles {
    pub encoders: Arc<dyn WheelEncoders>,
    pub motors: Arc<dyn DriveMotors>,
    pub line_sensor: Arc<dyn LineSensor>,
    pub range_sensor: Arc<dyn RangeSensor>,
}

/// Device driver trait for hardware abstraction
pub trait DeviceDriver: Send {
    /// Bring the hardware up and hand out component handles.
    ///
    /// The driver should:
    /// 1. Open and verify every component binding
    /// 2. Start internal threads (simulation, readers)
    /// 3. Return handles that stay valid until `shutdown`
    fn initialize(&mut self) -> Result<DeviceHandles>;

    /// Stop the motors and release the hardware. Safe to call more than once.
    fn shutdown(&mut self) -> Result<()>;
}
