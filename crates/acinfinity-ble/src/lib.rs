//! Bluetooth Low Energy backend for AC Infinity controller pairing
//!
//! This crate plugs btleplug into the collaborator traits of
//! `acinfinity-core`:
//!
//! - [`BleScanner`] implements [`acinfinity_core::AdvertisementSource`] for
//!   manual listings and offers a push subscription of vendor sightings
//! - [`BleDeviceTransport`] implements [`acinfinity_core::DeviceTransport`]
//!   for connectivity probes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use acinfinity_ble::{BleConfig, BleDeviceTransport, BleScanner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scanner = BleScanner::new(BleConfig::default());
//! scanner.initialize_adapter().await?;
//! scanner.start_scanning().await?;
//!
//! let transport = BleDeviceTransport::new(scanner.adapter()?.clone(), BleConfig::default());
//! # let _ = (Arc::new(scanner), Arc::new(transport));
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod discovery;
mod error;
mod protocol;

// Public API exports
pub use config::BleConfig;
pub use connection::BleDeviceTransport;
pub use discovery::BleScanner;
pub use error::{classify_btleplug_error, BleError};
pub use protocol::{
    sighting_address, ACINFINITY_NOTIFY_CHARACTERISTIC_UUID, ACINFINITY_SERVICE_UUID,
    ACINFINITY_WRITE_CHARACTERISTIC_UUID,
};

/// Sighting type produced by this backend
pub type BleSighting = acinfinity_core::AdvertisementSighting<btleplug::platform::PeripheralId>;
