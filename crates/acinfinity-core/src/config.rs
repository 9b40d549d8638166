//! Pairing session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::advertisement::MANUFACTURER_ID;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// What a manual session does when enumeration yields no candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyScanPolicy {
    /// Terminate the session with `no_devices_found`
    #[default]
    Abort,
    /// Report `no_devices_found` but leave the session restartable
    AllowRescan,
}

/// Configuration for a pairing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Manufacturer identifier selecting the vendor payload
    pub manufacturer_id: u16,
    /// Upper bound for each of the probe's connect and refresh steps
    pub probe_timeout: Duration,
    /// Behaviour when a manual enumeration finds nothing
    pub empty_scan_policy: EmptyScanPolicy,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: MANUFACTURER_ID,
            probe_timeout: Duration::from_secs(15),
            empty_scan_policy: EmptyScanPolicy::Abort,
        }
    }
}

impl PairingConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set manufacturer identifier
    pub fn with_manufacturer_id(mut self, manufacturer_id: u16) -> Self {
        self.manufacturer_id = manufacturer_id;
        self
    }

    /// Set probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set empty-scan policy
    pub fn with_empty_scan_policy(mut self, policy: EmptyScanPolicy) -> Self {
        self.empty_scan_policy = policy;
        self
    }
}
