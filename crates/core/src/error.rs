//! Error types for open-beastx-core.

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No device with the Beast X VID:PID is present.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Command issued while the session is not connected.
    #[error("not connected")]
    NotConnected,

    /// Another command is already in flight on this session.
    #[error("session busy: another command is in flight")]
    Busy,

    /// Device I/O did not complete within the bounded timeout.
    #[error("I/O timeout: {0}")]
    IoTimeout(String),

    /// Transport-level failure mid-operation.
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// Device report does not match the expected shape.
    #[error("malformed report: {0}")]
    MalformedReport(String),

    /// Value outside the enumerated domain.
    #[error("unsupported value: {field} = {value}")]
    UnsupportedValue { field: &'static str, value: u32 },

    /// Value out of the allowed range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Saved configuration could not be read.
    #[error("failed to read saved configuration: {0}")]
    PersistenceRead(String),

    /// Saved configuration could not be written.
    #[error("failed to write saved configuration: {0}")]
    PersistenceWrite(String),
}

impl Error {
    /// Whether this error means the device is gone and the session must
    /// drop to Disconnected and schedule a reconnect.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Error::DeviceNotFound(_) | Error::IoTimeout(_) | Error::IoFailure(_)
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
