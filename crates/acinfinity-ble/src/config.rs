//! BLE backend configuration

use std::time::Duration;

use acinfinity_core::MANUFACTURER_ID;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug scanner and transport
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// How long to scan before a manual listing is taken
    pub scan_duration: Duration,
    /// Maximum time to wait for the link layer connection
    pub connection_timeout: Duration,
    /// Index into the host's adapter list
    pub adapter_index: usize,
    /// Manufacturer identifier the push subscription filters on
    pub manufacturer_id: u16,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(10),
            adapter_index: 0,
            manufacturer_id: MANUFACTURER_ID,
        }
    }
}

impl BleConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan duration
    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Select adapter by index
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Set manufacturer identifier
    pub fn with_manufacturer_id(mut self, manufacturer_id: u16) -> Self {
        self.manufacturer_id = manufacturer_id;
        self
    }
}
