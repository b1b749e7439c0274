//! Error types for MargaNav

use std::time::Duration;
use thiserror::Error;

/// MargaNav error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hardware error: {0}")]
    Hardware(#[from] marga_io::Error),

    #[error("Calibration failed after {attempts} attempts ({edges} wall edges found)")]
    Calibration { attempts: u32, edges: usize },

    #[error("Localization failed: {0}")]
    Localization(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Interrupted by shutdown")]
    Interrupted,

    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
