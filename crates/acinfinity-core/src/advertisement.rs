//! Manufacturer-data decoding for AC Infinity advertisements
//!
//! Controllers broadcast a fixed-layout record under the vendor's Bluetooth SIG
//! company identifier. Only the identity-bearing fields are interpreted here:
//!
//! ```text
//! offset  size  field
//! 0       1     protocol version
//! 1       11    live state block (opaque, not interpreted)
//! 12      1     device type code
//! 13..          vendor extensions (ignored)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DecodeError;
use crate::types::AdvertisementSighting;

// ----------------------------------------------------------------------------
// Protocol Constants
// ----------------------------------------------------------------------------

/// Bluetooth SIG company identifier used by AC Infinity
pub const MANUFACTURER_ID: u16 = 0x0902;

/// Shortest payload that still carries the device type
pub const MIN_PAYLOAD_LEN: usize = 13;

const VERSION_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 12;

// ----------------------------------------------------------------------------
// Device Model
// ----------------------------------------------------------------------------

/// Controller hardware family, keyed by the advertised type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum DeviceModel {
    Controller67,
    Controller69,
    Controller69Pro,
    Controller69ProPlus,
    /// Type code not in the known model table
    Unknown(u8),
}

impl DeviceModel {
    /// Resolve a type code
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Controller67,
            7 => Self::Controller69,
            11 => Self::Controller69Pro,
            12 => Self::Controller69ProPlus,
            other => Self::Unknown(other),
        }
    }

    /// Type code as advertised
    pub fn code(self) -> u8 {
        match self {
            Self::Controller67 => 1,
            Self::Controller69 => 7,
            Self::Controller69Pro => 11,
            Self::Controller69ProPlus => 12,
            Self::Unknown(code) => code,
        }
    }

    /// Marketing name shown to operators
    pub fn name(self) -> String {
        match self {
            Self::Controller67 => "Controller 67".to_string(),
            Self::Controller69 => "UIS Controller 69".to_string(),
            Self::Controller69Pro => "UIS Controller 69 Pro".to_string(),
            Self::Controller69ProPlus => "UIS Controller 69 Pro+".to_string(),
            Self::Unknown(code) => format!("Unknown Device {}", code),
        }
    }
}

impl From<u8> for DeviceModel {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<DeviceModel> for u8 {
    fn from(model: DeviceModel) -> Self {
        model.code()
    }
}

// ----------------------------------------------------------------------------
// Device Identity
// ----------------------------------------------------------------------------

/// Model markers extracted from the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Advertisement protocol version
    pub version: u8,
    /// Hardware family
    pub model: DeviceModel,
}

/// Identity decoded from one manufacturer-data payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    pub model_info: ModelInfo,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (v{})", self.name, self.model_info.version)
    }
}

// ----------------------------------------------------------------------------
// Decoding
// ----------------------------------------------------------------------------

/// Decode the payload stored under [`MANUFACTURER_ID`]
pub fn decode(payload: &[u8]) -> Result<DeviceIdentity, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    if payload.len() < MIN_PAYLOAD_LEN {
        return Err(DecodeError::Truncated {
            len: payload.len(),
            min: MIN_PAYLOAD_LEN,
        });
    }

    let model = DeviceModel::from_code(payload[TYPE_OFFSET]);
    Ok(DeviceIdentity {
        name: model.name(),
        model_info: ModelInfo {
            version: payload[VERSION_OFFSET],
            model,
        },
    })
}

/// Encode model markers into a minimal payload that [`decode`] accepts
///
/// The live state block is zero-filled.
pub fn encode(info: &ModelInfo) -> Vec<u8> {
    let mut payload = vec![0u8; MIN_PAYLOAD_LEN];
    payload[VERSION_OFFSET] = info.version;
    payload[TYPE_OFFSET] = info.model.code();
    payload
}

/// Look up the vendor payload in a sighting and decode it
pub fn identity_from_sighting<H>(
    sighting: &AdvertisementSighting<H>,
    manufacturer_id: u16,
) -> Result<DeviceIdentity, DecodeError> {
    let payload = sighting
        .manufacturer_payload(manufacturer_id)
        .ok_or(DecodeError::MissingManufacturerData { manufacturer_id })?;
    decode(payload)
}
