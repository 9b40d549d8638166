//! AC Infinity pairing CLI entry point

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, error};

use acinfinity_cli::{cli::Cli, commands::CommandDispatcher, config::CliAppConfig, error::Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_configuration(&cli)?;

    // Command line flags override configuration
    if cli.verbose {
        config.cli.verbose = true;
    }
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = Some(PathBuf::from(data_dir));
    }
    if let Some(adapter) = cli.adapter {
        config.ble.adapter_index = adapter;
    }

    // Initialize logging
    setup_logging(config.cli.verbose);
    debug!("Registration store at {}", config.data_dir().display());

    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or the layered defaults
fn load_configuration(cli: &Cli) -> Result<CliAppConfig> {
    if let Some(config_path) = &cli.config {
        Ok(CliAppConfig::load_from_file(config_path)?)
    } else {
        Ok(CliAppConfig::load()?)
    }
}
