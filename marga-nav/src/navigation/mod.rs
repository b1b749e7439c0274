//! Waypoint navigation
//!
//! - [`controller`]: pure rotate-then-drive state machine
//! - [`navigator`]: periodic thread with `travel_to` / `wait_until_done`

pub mod controller;
pub mod navigator;

pub use controller::{Goal, MotorCommand, NavController, NavState, Waypoint, spin_command};
pub use navigator::Navigator;
