//! Error handling for the AC Infinity CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Pairing error: {0}")]
    Pairing(#[from] acinfinity_core::PairingError),

    #[error("BLE error: {0}")]
    Ble(#[from] acinfinity_ble::BleError),

    #[error("Scan error: {0}")]
    Scan(#[from] acinfinity_core::ScanError),

    #[error("Storage error: {0}")]
    Store(#[from] acinfinity_core::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
