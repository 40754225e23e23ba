use crate::device::DeviceUuid;
use std::io;
use thiserror::Error;

/// Errors raised while talking to a peripheral on an I2C bus
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open I2C bus device '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind peripheral address {address:#04x} on '{path}': {source}")]
    Bind {
        path: String,
        address: u8,
        #[source]
        source: io::Error,
    },

    #[error("I2C {op} on '{path}' failed: {source}")]
    Io {
        path: String,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Register {register:#04x} returned {read} byte(s), expected {expected}")]
    ShortRead { register: u8, read: usize, expected: usize },

    #[error("Couldn't write UUID: byte {index} reported {written} byte(s) written")]
    PartialWrite {
        index: usize,
        written: usize,
        #[source]
        source: Option<io::Error>,
    },

    #[error("Failed to close I2C bus device '{path}': {source}")]
    Close {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A UUID read that stopped before all 16 bytes arrived.
///
/// `bytes` holds whatever was filled before the failure; the rest stays zero.
/// Treat it as "UUID not reliably obtained".
#[derive(Error, Debug)]
#[error("UUID read stopped after {filled} of 16 byte(s): {error}")]
pub struct PartialUuid {
    pub bytes: DeviceUuid,
    pub filled: usize,
    #[source]
    pub error: DeviceError,
}

impl From<PartialUuid> for DeviceError {
    fn from(partial: PartialUuid) -> Self {
        partial.error
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration format: {0}")]
    FormatError(#[from] toml::de::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("No device named '{id}' in configuration")]
    UnknownDevice { id: String },
}

/// Result type aliases for convenience
pub type DeviceResult<T> = Result<T, DeviceError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
