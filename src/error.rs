//! Error types for diskmon

use std::io;
use thiserror::Error;

/// Result type alias for diskmon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
///
/// Only startup can fail outright. Everything on the per-read path is
/// absorbed into sentinel or stale values and never reaches the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Querying a device's counters failed
    #[error("Failed to query device: {0}")]
    QueryFailed(String),

    /// No disk devices found
    #[error("No disk devices found")]
    NoDevicesFound,

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unsupported platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The device table could not be allocated
    #[error("Allocation failed: {0}")]
    Allocation(String),
}

impl From<std::collections::TryReserveError> for Error {
    fn from(err: std::collections::TryReserveError) -> Self {
        Error::Allocation(err.to_string())
    }
}
