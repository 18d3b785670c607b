//! Error types for VIF plugging.

use thiserror::Error;

/// Errors raised by the plugging strategies.
#[derive(Error, Debug)]
pub enum VifPlugError {
    /// The VIF carries no port profile at all.
    #[error("VIF has no port profile")]
    MissingPortProfile,

    /// The VIF carries a port profile of a type this strategy cannot handle.
    #[error("VIF port profile has unsupported type: {0}")]
    WrongPortProfile(String),

    /// The network descriptor is internally inconsistent.
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// A device driver primitive failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors raised by a [`NetworkDeviceDriver`](crate::driver::NetworkDeviceDriver).
#[derive(Error, Debug)]
pub enum DriverError {
    /// The external tool could not be started.
    #[error("Failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool ran and exited unsuccessfully.
    #[error("{command} exited with {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The external tool did not finish in time.
    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// A sysfs/procfs control file could not be written.
    #[error("Failed to write {path}: {source}")]
    Sysfs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for plugging operations.
pub type Result<T> = std::result::Result<T, VifPlugError>;

/// Result type alias for driver primitives.
pub type DriverResult<T> = std::result::Result<T, DriverError>;
