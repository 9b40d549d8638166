//! JSON file registration store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use acinfinity_core::{
    CreateOutcome, DeviceAddress, RegistrationRecord, RegistrationStore, StoreError,
};

const FILE_NAME: &str = "registrations.json";
const FILE_VERSION: u32 = 1;

/// Registrations file format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistrationsFile {
    version: u32,
    registrations: Vec<RegistrationRecord>,
}

/// Registration store persisted as `registrations.json` in a data directory
///
/// All reads and writes go through one mutex, so the check-and-insert in
/// [`RegistrationStore::create_registration`] is atomic within the process.
pub struct FileRegistrationStore {
    file_path: PathBuf,
    records: Mutex<BTreeMap<DeviceAddress, RegistrationRecord>>,
}

impl FileRegistrationStore {
    /// Open the store, creating the data directory if needed
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir).map_err(|e| {
            StoreError::Unavailable(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let file_path = data_dir.join(FILE_NAME);
        let records = Self::load(&file_path)?;
        info!(
            "Loaded {} registration(s) from {}",
            records.len(),
            file_path.display()
        );

        Ok(Self {
            file_path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// All registrations, ordered by address
    pub async fn registrations(&self) -> Vec<RegistrationRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    /// Remove a registration; returns whether one existed
    pub async fn remove(&self, address: &DeviceAddress) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        if records.remove(address).is_none() {
            return Ok(false);
        }
        self.save(&records)?;
        info!("Removed registration for {}", address);
        Ok(true)
    }

    fn load(path: &Path) -> Result<BTreeMap<DeviceAddress, RegistrationRecord>, StoreError> {
        if !path.exists() {
            debug!("Registrations file doesn't exist, starting empty");
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Unavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: RegistrationsFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("Failed to parse {}: {}", FILE_NAME, e)))?;

        if file.version != FILE_VERSION {
            return Err(StoreError::Corrupt(format!(
                "Unsupported registrations file version {}",
                file.version
            )));
        }

        Ok(file
            .registrations
            .into_iter()
            .map(|record| (record.address.clone(), record))
            .collect())
    }

    fn save(&self, records: &BTreeMap<DeviceAddress, RegistrationRecord>) -> Result<(), StoreError> {
        let file = RegistrationsFile {
            version: FILE_VERSION,
            registrations: records.values().cloned().collect(),
        };

        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| StoreError::Unavailable(format!("Failed to serialize registrations: {}", e)))?;

        // Write then rename so a crash never leaves a half-written file
        let tmp_path = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)
            .and_then(|_| std::fs::rename(&tmp_path, &self.file_path))
            .map_err(|e| {
                StoreError::Unavailable(format!(
                    "Failed to write {}: {}",
                    self.file_path.display(),
                    e
                ))
            })?;

        debug!("Saved {} registration(s)", records.len());
        Ok(())
    }
}

#[async_trait]
impl RegistrationStore for FileRegistrationStore {
    async fn is_registered(&self, address: &DeviceAddress) -> Result<bool, StoreError> {
        Ok(self.records.lock().await.contains_key(address))
    }

    async fn create_registration(
        &self,
        record: RegistrationRecord,
    ) -> Result<CreateOutcome, StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.address) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        records.insert(record.address.clone(), record.clone());
        if let Err(e) = self.save(&records) {
            records.remove(&record.address);
            return Err(e);
        }

        info!("Registered {} as {}", record.address, record.display_name);
        Ok(CreateOutcome::Created)
    }
}
