//! Command handlers for the AC Infinity CLI

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use acinfinity_ble::{BleDeviceTransport, BleScanner};
use acinfinity_core::{
    AbortReason, AdvertisementSource, CandidateRegistry, DeviceAddress, PairingSession,
    SessionEntry, StepOutcome,
};

use crate::cli::{Cli, Commands};
use crate::config::CliAppConfig;
use crate::error::Result;
use crate::store::FileRegistrationStore;
use crate::terminal::drive_selection;

type BleSession = PairingSession<BleScanner, BleDeviceTransport, FileRegistrationStore>;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        match cli.command {
            Commands::Scan => Self::handle_scan_command(&config).await,
            Commands::Pair { watch } => {
                if watch {
                    Self::handle_watch_command(&config).await
                } else {
                    Self::handle_pair_command(&config).await
                }
            }
            Commands::Devices => Self::handle_devices_command(&config).await,
            Commands::Forget { address } => Self::handle_forget_command(&config, &address).await,
            Commands::Config { example } => Self::handle_config_command(&config, example),
        }
    }

    /// Handle the scan command
    async fn handle_scan_command(config: &CliAppConfig) -> Result<()> {
        let store = Self::open_store(config)?;
        let scanner = Self::start_scanner(config).await?;
        tokio::time::sleep(config.ble.scan_duration).await;
        let sightings = scanner.discovered().await;
        scanner.stop_scanning().await?;

        let mut registry = CandidateRegistry::new(config.pairing.manufacturer_id);
        for sighting in sightings? {
            registry.merge(sighting);
        }

        let registered: HashSet<DeviceAddress> = store
            .registrations()
            .await
            .into_iter()
            .map(|record| record.address)
            .collect();
        let candidates = registry.list(|address| registered.contains(address));

        if candidates.is_empty() {
            println!("No unregistered controllers in range");
        } else {
            println!("Controllers in range:");
            for candidate in candidates {
                println!("  {}", candidate.label);
            }
        }
        Ok(())
    }

    /// Handle the pair command: list once, then let the operator choose
    async fn handle_pair_command(config: &CliAppConfig) -> Result<()> {
        let store = Arc::new(Self::open_store(config)?);
        let scanner = Self::start_scanner(config).await?;
        let transport = BleDeviceTransport::new(scanner.adapter()?.clone(), config.ble.clone());

        info!(
            "Scanning for {}s before listing controllers",
            config.ble.scan_duration.as_secs()
        );
        tokio::time::sleep(config.ble.scan_duration).await;

        let scanner = Arc::new(scanner);
        let mut session: BleSession = PairingSession::new(
            config.pairing.clone(),
            Arc::clone(&scanner),
            Arc::new(transport),
            store,
        );
        let mut input = BufReader::new(tokio::io::stdin()).lines();

        let first = session.start(SessionEntry::Manual).await?;
        let outcome = drive_selection(&mut session, first, &mut input, true).await;

        scanner.stop_scanning().await?;
        Self::report(&outcome?);
        Ok(())
    }

    /// Handle `pair --watch`: offer each controller as it advertises
    async fn handle_watch_command(config: &CliAppConfig) -> Result<()> {
        let store = Arc::new(Self::open_store(config)?);
        let scanner = Self::start_scanner(config).await?;
        let transport = Arc::new(BleDeviceTransport::new(
            scanner.adapter()?.clone(),
            config.ble.clone(),
        ));
        let mut sightings = scanner.subscribe().await?;
        let scanner = Arc::new(scanner);
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut offered: HashSet<DeviceAddress> = HashSet::new();

        println!("Watching for controllers... Press Ctrl+C to stop");

        loop {
            let sighting = tokio::select! {
                sighting = sightings.recv() => match sighting {
                    Some(sighting) => sighting,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            };

            // Each controller is offered once per run
            if !offered.insert(sighting.address.clone()) {
                continue;
            }

            let mut session: BleSession = PairingSession::new(
                config.pairing.clone(),
                Arc::clone(&scanner),
                Arc::clone(&transport),
                Arc::clone(&store),
            );
            let first = session.start(SessionEntry::Push(sighting)).await?;
            if first == StepOutcome::Aborted(AbortReason::AlreadyConfigured) {
                debug!("Skipping registered controller");
                continue;
            }

            let outcome = drive_selection(&mut session, first, &mut input, false).await?;
            Self::report(&outcome);
        }

        scanner.stop_scanning().await?;
        Ok(())
    }

    /// Handle the devices command
    async fn handle_devices_command(config: &CliAppConfig) -> Result<()> {
        let store = Self::open_store(config)?;
        let registrations = store.registrations().await;

        if registrations.is_empty() {
            println!("No registered controllers");
            return Ok(());
        }

        println!("Registered controllers:");
        for record in registrations {
            println!(
                "  {}  {}  (type {}, protocol v{})",
                record.address,
                record.display_name,
                record.identity.model_info.model.code(),
                record.identity.model_info.version
            );
        }
        Ok(())
    }

    /// Handle the forget command
    async fn handle_forget_command(config: &CliAppConfig, address: &str) -> Result<()> {
        let store = Self::open_store(config)?;
        let address = DeviceAddress::new(address);

        if store.remove(&address).await? {
            println!("Forgot {}", address);
        } else {
            warn!("No registration for {}", address);
            println!("{} is not registered", address);
        }
        Ok(())
    }

    /// Handle the config command
    fn handle_config_command(config: &CliAppConfig, example: bool) -> Result<()> {
        if example {
            println!("{}", CliAppConfig::example_config());
        } else {
            println!("{}", config.to_toml()?);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn open_store(config: &CliAppConfig) -> Result<FileRegistrationStore> {
        Ok(FileRegistrationStore::open(&config.data_dir())?)
    }

    async fn start_scanner(config: &CliAppConfig) -> Result<BleScanner> {
        let mut scanner = BleScanner::new(config.ble.clone());
        scanner.initialize_adapter().await?;
        scanner.start_scanning().await?;
        Ok(scanner)
    }

    fn report(outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Completed(record) => {
                println!("Registered {} ({})", record.display_name, record.address);
            }
            StepOutcome::Aborted(reason) => {
                let message = match reason {
                    AbortReason::AlreadyConfigured => "Device is already configured",
                    AbortReason::NoDevicesFound => "No unconfigured AC Infinity devices found",
                    AbortReason::NotSupported => "Device is not supported",
                    AbortReason::Cancelled => "Pairing cancelled",
                };
                println!("{}", message);
            }
            StepOutcome::ShowCandidates { .. } => {}
        }
    }
}
