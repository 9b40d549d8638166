//! Short-lived controller connections used for connectivity probes

use acinfinity_core::{DeviceTransport, ProbeError, TransportErrorKind};
use async_trait::async_trait;
use btleplug::api::{Central, CharPropFlags, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral, PeripheralId};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::BleConfig;
use crate::error::classify_btleplug_error;
use crate::protocol::ACINFINITY_NOTIFY_CHARACTERISTIC_UUID;

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

/// btleplug implementation of the probe transport
pub struct BleDeviceTransport {
    adapter: Adapter,
    config: BleConfig,
}

impl BleDeviceTransport {
    pub fn new(adapter: Adapter, config: BleConfig) -> Self {
        Self { adapter, config }
    }

    async fn release(peripheral: &Peripheral) {
        match peripheral.is_connected().await {
            Ok(false) => {}
            Ok(true) | Err(_) => {
                if let Err(e) = peripheral.disconnect().await {
                    error!("Failed to disconnect from {:?}: {}", peripheral.id(), e);
                }
            }
        }
    }
}

#[async_trait]
impl DeviceTransport for BleDeviceTransport {
    type Handle = PeripheralId;
    type Connection = Peripheral;

    async fn open(&self, handle: &PeripheralId) -> Result<Peripheral, ProbeError> {
        let peripheral = self
            .adapter
            .peripheral(handle)
            .await
            .map_err(classify_btleplug_error)?;

        match timeout(self.config.connection_timeout, peripheral.connect()).await {
            Ok(Ok(())) => info!("Connected to {:?}", handle),
            Ok(Err(e)) => {
                error!("Failed to connect to {:?}: {}", handle, e);
                return Err(classify_btleplug_error(e));
            }
            Err(_) => {
                error!("Connection to {:?} timed out", handle);
                // The link may still come up after we stop waiting
                Self::release(&peripheral).await;
                return Err(TransportErrorKind::Timeout.into());
            }
        }

        // Discover services and characteristics
        match timeout(self.config.connection_timeout, peripheral.discover_services()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Failed to discover services for {:?}: {}", handle, e);
                Self::release(&peripheral).await;
                return Err(classify_btleplug_error(e));
            }
            Err(_) => {
                error!("Service discovery for {:?} timed out", handle);
                Self::release(&peripheral).await;
                return Err(TransportErrorKind::Timeout.into());
            }
        }

        Ok(peripheral)
    }

    async fn refresh(&self, connection: &mut Peripheral) -> Result<Vec<u8>, ProbeError> {
        let connected = connection
            .is_connected()
            .await
            .map_err(classify_btleplug_error)?;
        if !connected {
            return Err(TransportErrorKind::Disconnected.into());
        }

        // Reading the state characteristic makes the controller re-advertise
        // its current state
        let state_char = connection
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == ACINFINITY_NOTIFY_CHARACTERISTIC_UUID);
        if let Some(state_char) = state_char {
            if state_char.properties.contains(CharPropFlags::READ) {
                let value = connection
                    .read(&state_char)
                    .await
                    .map_err(classify_btleplug_error)?;
                debug!("State of {:?}: {}", connection.id(), hex::encode(&value));
            }
        }

        let properties = connection
            .properties()
            .await
            .map_err(classify_btleplug_error)?
            .ok_or_else(|| ProbeError::Unexpected("peripheral has no properties".into()))?;

        properties
            .manufacturer_data
            .get(&self.config.manufacturer_id)
            .cloned()
            .ok_or_else(|| {
                ProbeError::Unexpected(format!(
                    "no manufacturer data for 0x{:04X} after refresh",
                    self.config.manufacturer_id
                ))
            })
    }

    async fn close(&self, connection: Peripheral) {
        Self::release(&connection).await;
        debug!("Released connection to {:?}", connection.id());
    }
}
