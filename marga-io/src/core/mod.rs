//! Core traits and types shared by every device driver

pub mod driver;
pub mod types;
