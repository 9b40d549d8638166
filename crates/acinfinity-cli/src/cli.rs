//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Data directory for the registration store
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Index of the Bluetooth adapter to use
    #[arg(long)]
    pub adapter: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List controllers in range that are not yet registered
    Scan,
    /// Pair a controller
    Pair {
        /// Offer each controller as it advertises instead of listing once
        #[arg(short, long)]
        watch: bool,
    },
    /// List registered controllers
    Devices,
    /// Remove a registration
    Forget {
        /// Controller address
        address: String,
    },
    /// Print configuration
    Config {
        /// Print an annotated example instead of the effective configuration
        #[arg(long)]
        example: bool,
    },
}
