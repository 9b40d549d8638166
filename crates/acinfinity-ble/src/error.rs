//! Error types for the BLE backend

use acinfinity_core::{ProbeError, ScanError, TransportErrorKind};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors from adapter setup and scanning
#[derive(Error, Debug)]
pub enum BleError {
    #[error("Failed to create BLE manager: {0}")]
    ManagerUnavailable(String),

    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("BLE adapter not initialized")]
    AdapterNotInitialized,

    #[error("Failed to start BLE scan: {0}")]
    ScanFailed(String),

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),
}

impl From<BleError> for ScanError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::AdapterNotAvailable | BleError::AdapterNotInitialized => {
                ScanError::AdapterNotAvailable
            }
            other => ScanError::Failed(other.to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Probe Error Classification
// ----------------------------------------------------------------------------

/// Sort a btleplug failure into an expected transport kind or an unexpected
/// error
///
/// Backends report refusals and link aborts as free-form text, so those are
/// recognized by message.
pub fn classify_btleplug_error(err: btleplug::Error) -> ProbeError {
    match err {
        btleplug::Error::DeviceNotFound => TransportErrorKind::NotFound.into(),
        btleplug::Error::NotConnected => TransportErrorKind::Disconnected.into(),
        btleplug::Error::TimedOut(_) => TransportErrorKind::Timeout.into(),
        other => {
            let message = other.to_string();
            let lowered = message.to_ascii_lowercase();
            if lowered.contains("refused") || lowered.contains("rejected") {
                TransportErrorKind::Refused.into()
            } else if lowered.contains("disconnect") || lowered.contains("connection-abort") {
                TransportErrorKind::Disconnected.into()
            } else if lowered.contains("timed out") || lowered.contains("timeout") {
                TransportErrorKind::Timeout.into()
            } else if lowered.contains("not found") || lowered.contains("does not exist") {
                TransportErrorKind::NotFound.into()
            } else {
                ProbeError::Unexpected(message)
            }
        }
    }
}
