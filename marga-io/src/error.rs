//! Error types for MargaIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// MargaIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Device not initialized
    #[error("Device not initialized")]
    NotInitialized,

    /// Component not available on this device
    #[error("Component not available: {0}")]
    ComponentNotAvailable(&'static str),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device reported a failure
    #[error("Device error: {0}")]
    Device(String),
}
