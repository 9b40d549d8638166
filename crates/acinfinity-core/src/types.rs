//! Core data types shared by the pairing workflow

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::advertisement::DeviceIdentity;

// ----------------------------------------------------------------------------
// Device Address
// ----------------------------------------------------------------------------

/// Stable, vendor-assigned identifier of one physical device
///
/// Addresses are compared case-insensitively; the canonical form is trimmed
/// and upper-cased so `aa:bb:cc:dd:ee:ff` and `AA:BB:CC:DD:EE:FF` name the
/// same controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Create an address from any string form
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(address.as_ref().trim().to_ascii_uppercase())
    }

    /// Borrow the canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceAddress {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for DeviceAddress {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ----------------------------------------------------------------------------
// Advertisement Sighting
// ----------------------------------------------------------------------------

/// One observed advertisement broadcast
///
/// `H` is the scanning backend's handle type, used later to open a
/// connection to the same device.
#[derive(Debug, Clone)]
pub struct AdvertisementSighting<H> {
    /// Device address, the deduplication key
    pub address: DeviceAddress,
    /// Manufacturer-specific data keyed by 16-bit manufacturer identifier
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised local name, if any
    pub local_name: Option<String>,
    /// Backend handle for opening a connection
    pub handle: H,
}

impl<H> AdvertisementSighting<H> {
    /// Create a sighting with no manufacturer data
    pub fn new(address: DeviceAddress, handle: H) -> Self {
        Self {
            address,
            manufacturer_data: HashMap::new(),
            local_name: None,
            handle,
        }
    }

    /// Attach a manufacturer-data record
    pub fn with_manufacturer_data(mut self, manufacturer_id: u16, payload: Vec<u8>) -> Self {
        self.manufacturer_data.insert(manufacturer_id, payload);
        self
    }

    /// Payload advertised under `manufacturer_id`, if present
    pub fn manufacturer_payload(&self, manufacturer_id: u16) -> Option<&[u8]> {
        self.manufacturer_data
            .get(&manufacturer_id)
            .map(Vec::as_slice)
    }

    /// Whether this sighting carries data for `manufacturer_id`
    pub fn advertises(&self, manufacturer_id: u16) -> bool {
        self.manufacturer_data.contains_key(&manufacturer_id)
    }
}

// ----------------------------------------------------------------------------
// Registration Record
// ----------------------------------------------------------------------------

/// Durable record emitted once a device has been verified
///
/// The `identity` field is the decoded manufacturer payload; its serde
/// representation is the canonical serialized identity handed to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Verified device address
    pub address: DeviceAddress,
    /// Name reported by the probed device
    pub display_name: String,
    /// Decoded identity at verification time
    pub identity: DeviceIdentity,
}
