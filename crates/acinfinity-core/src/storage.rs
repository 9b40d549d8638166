//! Seam for the persistent registration store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::StoreError;
use crate::types::{DeviceAddress, RegistrationRecord};

// ----------------------------------------------------------------------------
// Store Contract
// ----------------------------------------------------------------------------

/// Result of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A registration for the address already existed; nothing was written
    AlreadyExists,
}

/// Registrations keyed by unique device address
///
/// Implementations are shared between concurrently running sessions, so
/// `create_registration` must check and insert atomically.
#[async_trait]
pub trait RegistrationStore: Send + Sync + 'static {
    async fn is_registered(&self, address: &DeviceAddress) -> Result<bool, StoreError>;

    async fn create_registration(
        &self,
        record: RegistrationRecord,
    ) -> Result<CreateOutcome, StoreError>;
}

// ----------------------------------------------------------------------------
// In-Memory Store
// ----------------------------------------------------------------------------

/// Process-local store, suitable for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    records: RwLock<HashMap<DeviceAddress, RegistrationRecord>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored registrations, ordered by address
    pub async fn registrations(&self) -> Vec<RegistrationRecord> {
        let records = self.records.read().await;
        let mut all: Vec<RegistrationRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.address.cmp(&b.address));
        all
    }

    /// Remove a registration; returns whether one existed
    pub async fn remove(&self, address: &DeviceAddress) -> bool {
        self.records.write().await.remove(address).is_some()
    }
}

#[async_trait]
impl RegistrationStore for MemoryRegistrationStore {
    async fn is_registered(&self, address: &DeviceAddress) -> Result<bool, StoreError> {
        Ok(self.records.read().await.contains_key(address))
    }

    async fn create_registration(
        &self,
        record: RegistrationRecord,
    ) -> Result<CreateOutcome, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.address) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        info!("Registered {} as {}", record.address, record.display_name);
        records.insert(record.address.clone(), record);
        Ok(CreateOutcome::Created)
    }
}
