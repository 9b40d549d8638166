//! BLE scanning and advertisement discovery

use std::collections::HashMap;

use acinfinity_core::{AdvertisementSighting, AdvertisementSource, ScanError};
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::BleConfig;
use crate::error::BleError;
use crate::protocol::sighting_from_properties;

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

/// Scans for advertisements through the host's BLE adapter
pub struct BleScanner {
    config: BleConfig,
    adapter: Option<Adapter>,
}

impl BleScanner {
    /// Create a scanner; call [`initialize_adapter`](Self::initialize_adapter) before use
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            adapter: None,
        }
    }

    /// Initialize BLE adapter
    pub async fn initialize_adapter(&mut self) -> Result<(), BleError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleError::ManagerUnavailable(e.to_string()))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleError::ManagerUnavailable(e.to_string()))?;

        let adapter = adapters
            .into_iter()
            .nth(self.config.adapter_index)
            .ok_or(BleError::AdapterNotAvailable)?;

        info!("BLE adapter {} initialized", self.config.adapter_index);
        self.adapter = Some(adapter);
        Ok(())
    }

    /// Get adapter reference
    pub fn adapter(&self) -> Result<&Adapter, BleError> {
        self.adapter.as_ref().ok_or(BleError::AdapterNotInitialized)
    }

    /// Start scanning for advertisements
    ///
    /// No service filter is applied: controllers only identify themselves
    /// through manufacturer data.
    pub async fn start_scanning(&self) -> Result<(), BleError> {
        self.adapter()?
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| BleError::ScanFailed(e.to_string()))?;

        info!("Started BLE scanning");
        Ok(())
    }

    /// Stop scanning
    pub async fn stop_scanning(&self) -> Result<(), BleError> {
        if let Some(adapter) = &self.adapter {
            adapter
                .stop_scan()
                .await
                .map_err(|e| BleError::ScanFailed(e.to_string()))?;
        }
        Ok(())
    }

    /// Stream vendor sightings as they are advertised
    ///
    /// Each manufacturer-data advertisement carrying the configured
    /// manufacturer identifier is forwarded; the stream ends when the
    /// receiver is dropped or the adapter's event stream closes.
    pub async fn subscribe(&self) -> Result<mpsc::Receiver<AdvertisementSighting<PeripheralId>>, BleError> {
        let adapter = self.adapter()?.clone();
        let manufacturer_id = self.config.manufacturer_id;
        let mut events = adapter
            .events()
            .await
            .map_err(|e| BleError::EventStreamFailed(e.to_string()))?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let CentralEvent::ManufacturerDataAdvertisement {
                    id,
                    manufacturer_data,
                } = event
                else {
                    continue;
                };
                if !manufacturer_data.contains_key(&manufacturer_id) {
                    continue;
                }

                let looked_up = Self::lookup(&adapter, &id).await;
                let Some(sighting) = pushed_sighting(manufacturer_id, manufacturer_data, looked_up)
                else {
                    debug!("No properties for {:?} yet, skipping advertisement", id);
                    continue;
                };

                debug!("Vendor advertisement from {}", sighting.address);
                if tx.send(sighting).await.is_err() {
                    break;
                }
            }
            debug!("Advertisement subscription ended");
        });

        Ok(rx)
    }

    async fn lookup(adapter: &Adapter, id: &PeripheralId) -> Option<AdvertisementSighting<PeripheralId>> {
        let peripheral = adapter.peripheral(id).await.ok()?;
        let properties = peripheral.properties().await.ok()??;
        Some(sighting_from_properties(id.clone(), properties))
    }
}

/// Sighting to forward for a pushed advertisement
///
/// Only a sighting resolved from the peripheral's properties carries the same
/// address a listing reports, so nothing is forwarded without one. The pushed
/// manufacturer data is fresher than the cached properties and replaces them.
fn pushed_sighting<H>(
    manufacturer_id: u16,
    manufacturer_data: HashMap<u16, Vec<u8>>,
    looked_up: Option<AdvertisementSighting<H>>,
) -> Option<AdvertisementSighting<H>> {
    let mut sighting = looked_up?;
    if manufacturer_data.contains_key(&manufacturer_id) {
        sighting.manufacturer_data.extend(manufacturer_data);
    }
    Some(sighting)
}

#[async_trait]
impl AdvertisementSource for BleScanner {
    type Handle = PeripheralId;

    async fn discovered(&self) -> Result<Vec<AdvertisementSighting<PeripheralId>>, ScanError> {
        let adapter = self.adapter()?;
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| ScanError::Failed(e.to_string()))?;

        let mut sightings = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            match peripheral.properties().await {
                Ok(Some(properties)) => {
                    sightings.push(sighting_from_properties(peripheral.id(), properties));
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read properties of {:?}: {}", peripheral.id(), e),
            }
        }

        debug!("Adapter reports {} visible peripheral(s)", sightings.len());
        Ok(sightings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acinfinity_core::{DeviceAddress, MANUFACTURER_ID};

    fn advertised(payload: &[u8]) -> HashMap<u16, Vec<u8>> {
        HashMap::from([(MANUFACTURER_ID, payload.to_vec())])
    }

    #[test]
    fn test_unresolved_advertisement_is_skipped() {
        let sighting = pushed_sighting::<u8>(MANUFACTURER_ID, advertised(&[1, 2, 3]), None);
        assert!(sighting.is_none());
    }

    #[test]
    fn test_resolved_advertisement_keeps_listing_address() {
        let resolved = AdvertisementSighting::new(DeviceAddress::new("AA:BB:CC:DD:EE:FF"), 7u8)
            .with_manufacturer_data(MANUFACTURER_ID, vec![0; 13]);

        let sighting =
            pushed_sighting(MANUFACTURER_ID, advertised(&[9; 13]), Some(resolved)).unwrap();

        assert_eq!(sighting.address, DeviceAddress::new("AA:BB:CC:DD:EE:FF"));
        assert_eq!(sighting.manufacturer_payload(MANUFACTURER_ID), Some(&[9u8; 13][..]));
    }
}
