//! Error types for the pairing workflow
//!
//! Decode failures only ever filter candidacy, probe failures are
//! retry-eligible and annotate the session, and everything the caller can act
//! on surfaces through [`PairingError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::PairingState;
use crate::types::DeviceAddress;

// ----------------------------------------------------------------------------
// Decode Errors
// ----------------------------------------------------------------------------

/// Manufacturer payload could not be turned into a device identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No manufacturer data for id {manufacturer_id:#06x}")]
    MissingManufacturerData { manufacturer_id: u16 },

    #[error("Manufacturer payload is empty")]
    Empty,

    #[error("Manufacturer payload too short: {len} bytes (min: {min})")]
    Truncated { len: usize, min: usize },
}

// ----------------------------------------------------------------------------
// Probe Errors
// ----------------------------------------------------------------------------

/// Expected transport-layer failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    NotFound,
    Refused,
    Timeout,
    Disconnected,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NotFound => "device not found",
            Self::Refused => "connection refused",
            Self::Timeout => "timed out",
            Self::Disconnected => "device disconnected",
        };
        f.write_str(text)
    }
}

/// Outcome of a failed connectivity probe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Transport error: {0}")]
    Transport(TransportErrorKind),

    #[error("Unexpected probe failure: {0}")]
    Unexpected(String),
}

impl From<TransportErrorKind> for ProbeError {
    fn from(kind: TransportErrorKind) -> Self {
        Self::Transport(kind)
    }
}

// ----------------------------------------------------------------------------
// Collaborator Errors
// ----------------------------------------------------------------------------

/// Scanning collaborator failed to enumerate sightings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Scan failed: {0}")]
    Failed(String),
}

/// Registration storage failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Registration storage unavailable: {0}")]
    Unavailable(String),

    #[error("Registration data corrupt: {0}")]
    Corrupt(String),
}

// ----------------------------------------------------------------------------
// Pairing Errors
// ----------------------------------------------------------------------------

/// Errors returned to the caller driving a pairing session
///
/// Aborts such as an already-registered device are not errors; they are
/// reported as [`crate::StepOutcome::Aborted`].
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: PairingState,
    },

    #[error("Address {address} is not a selectable candidate")]
    UnknownCandidate { address: DeviceAddress },

    #[error("Rescan is only available for manually started sessions")]
    RescanUnavailable,

    #[error("Scanner error: {0}")]
    Scan(#[from] ScanError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
