//! Operational error types for rutificador
//!
//! Problems with an individual identifier are never reported through this
//! type: they are data ([`ErrorDetail`](crate::detail::ErrorDetail)) so a
//! batch can keep going. This enum covers everything around them.

use thiserror::Error;

/// Common result type for rutificador operations
pub type Result<T> = std::result::Result<T, Error>;

/// Operational errors around identifier processing
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration value out of range or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML configuration file could not be parsed
    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested output format is not registered
    #[error("Unsupported format '{requested}'. Available formats: {available}")]
    UnsupportedFormat { requested: String, available: String },

    /// Invalid caller-supplied option
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Background task failed to complete
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
