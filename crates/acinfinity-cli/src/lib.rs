//! AC Infinity CLI library
//!
//! Command handling, configuration and the file-backed registration store for
//! the `acinfinity` pairing tool.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod store;
pub mod terminal;

pub use cli::{Cli, Commands};
pub use config::CliAppConfig;
pub use error::{CliError, Result};
pub use store::FileRegistrationStore;
