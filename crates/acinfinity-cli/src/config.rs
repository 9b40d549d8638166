//! AC Infinity CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `acinfinity.toml` in the working directory
//! - `~/.acinfinity/config.toml`
//! - Environment variables (`ACINFINITY_*`, nested keys separated by `__`)
//!
//! Command line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use acinfinity_ble::BleConfig;
use acinfinity_core::{EmptyScanPolicy, PairingConfig};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the AC Infinity CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliAppConfig {
    /// Pairing session behaviour
    pub pairing: PairingConfig,

    /// BLE scanner and transport configuration
    pub ble: BleConfig,

    /// Registration store location
    pub storage: StorageConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// Where registrations are persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `registrations.json`; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Enable verbose logging output
    pub verbose: bool,
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl CliAppConfig {
    /// Load configuration with the standard priority order
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("acinfinity.toml"));

        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        let config: CliAppConfig = figment
            .merge(Env::prefixed("ACINFINITY_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Loading(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()));

        let config: CliAppConfig = figment.extract().map_err(|e| {
            ConfigError::Loading(format!(
                "Failed to load from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".acinfinity").join("config.toml"))
    }

    /// Directory for the registration store
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("acinfinity"))
                .unwrap_or_else(|| PathBuf::from(".acinfinity"))
        })
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pairing.probe_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "Probe timeout must be greater than 0".to_string(),
            ));
        }

        if self.ble.connection_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "BLE connection timeout must be greater than 0".to_string(),
            ));
        }

        // Each probe step must outlast the transport's own connect deadline
        if self.pairing.probe_timeout < self.ble.connection_timeout {
            return Err(ConfigError::Validation(format!(
                "Probe timeout ({}s) must not be shorter than the BLE connection timeout ({}s)",
                self.pairing.probe_timeout.as_secs_f32(),
                self.ble.connection_timeout.as_secs_f32()
            )));
        }

        // The push subscription and the session must agree on the vendor
        if self.ble.manufacturer_id != self.pairing.manufacturer_id {
            return Err(ConfigError::Validation(format!(
                "BLE manufacturer id 0x{:04X} does not match pairing manufacturer id 0x{:04X}",
                self.ble.manufacturer_id, self.pairing.manufacturer_id
            )));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        let example_config = CliAppConfig {
            pairing: PairingConfig::default()
                .with_probe_timeout(Duration::from_secs(20))
                .with_empty_scan_policy(EmptyScanPolicy::AllowRescan),
            ble: BleConfig::default().with_scan_duration(Duration::from_secs(8)),
            storage: StorageConfig {
                data_dir: Some(PathBuf::from("/var/lib/acinfinity")),
            },
            cli: CliConfig { verbose: false },
        };

        example_config
            .to_toml()
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
