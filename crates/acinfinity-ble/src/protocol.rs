//! AC Infinity GATT constants and advertisement mapping

use acinfinity_core::{AdvertisementSighting, DeviceAddress};
use btleplug::api::{BDAddr, PeripheralProperties};
use btleplug::platform::PeripheralId;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// BLE Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Controller GATT service UUID
pub const ACINFINITY_SERVICE_UUID: Uuid = Uuid::from_u128(0x70D51000_2C7F_4E75_AE8A_D758951CE4E0);

/// Characteristic accepting commands
pub const ACINFINITY_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x70D51001_2C7F_4E75_AE8A_D758951CE4E0);

/// Characteristic carrying state reports
pub const ACINFINITY_NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x70D51002_2C7F_4E75_AE8A_D758951CE4E0);

// ----------------------------------------------------------------------------
// Advertisement Mapping
// ----------------------------------------------------------------------------

/// MAC address, when the platform exposes one
fn address_from_bdaddr(address: BDAddr) -> Option<DeviceAddress> {
    if address.into_inner() == [0u8; 6] {
        None
    } else {
        Some(DeviceAddress::new(address.to_string()))
    }
}

/// Stable address for a peripheral
///
/// CoreBluetooth hides MAC addresses, so the platform peripheral id stands in
/// when the reported address is all zeroes.
pub fn sighting_address(id: &PeripheralId, address: BDAddr) -> DeviceAddress {
    address_from_bdaddr(address).unwrap_or_else(|| DeviceAddress::new(format!("{:?}", id)))
}

pub(crate) fn sighting_from_properties(
    id: PeripheralId,
    properties: PeripheralProperties,
) -> AdvertisementSighting<PeripheralId> {
    let mut sighting = AdvertisementSighting::new(sighting_address(&id, properties.address), id);
    sighting.manufacturer_data = properties.manufacturer_data;
    sighting.local_name = properties.local_name;
    sighting
}
