//! Pairing workflow for AC Infinity Bluetooth Low Energy controllers
//!
//! This crate contains the transport-agnostic part of pairing: turning raw
//! advertisement sightings into selectable candidates, verifying that the
//! chosen device answers a live connection, and emitting a registration record
//! exactly once per verified device.
//!
//! ## Architecture
//!
//! - [`advertisement`] - Manufacturer-data decoding into a [`DeviceIdentity`]
//! - [`registry`] - Address-keyed, deduplicating candidate set
//! - [`prober`] - Connect/refresh/release reachability check
//! - [`session`] - The pairing state machine driving both entry paths
//! - [`discovery`] and [`storage`] - Seams for the scanning and persistence
//!   collaborators
//!
//! Scanning, BLE connections and persistence are supplied by the host through
//! the [`AdvertisementSource`], [`DeviceTransport`] and [`RegistrationStore`]
//! traits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use acinfinity_core::{PairingConfig, PairingSession, SessionEntry, StepOutcome};
//!
//! let mut session = PairingSession::new(PairingConfig::default(), source, transport, store);
//! match session.start(SessionEntry::Manual).await? {
//!     StepOutcome::ShowCandidates { candidates, .. } => {
//!         let outcome = session.select(&candidates[0].address).await?;
//!     }
//!     StepOutcome::Aborted(reason) => println!("aborted: {reason}"),
//!     StepOutcome::Completed(_) => unreachable!(),
//! }
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod advertisement;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod prober;
pub mod registry;
pub mod session;
pub mod storage;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use advertisement::{
    decode, encode, identity_from_sighting, DeviceIdentity, DeviceModel, ModelInfo,
    MANUFACTURER_ID,
};
pub use config::{EmptyScanPolicy, PairingConfig};
pub use discovery::AdvertisementSource;
pub use errors::{
    DecodeError, PairingError, ProbeError, ScanError, StoreError, TransportErrorKind,
};
pub use prober::{ConnectivityProber, DeviceTransport};
pub use registry::{Candidate, CandidateRegistry};
pub use session::{
    AbortReason, PairingSession, PairingState, SessionEntry, SessionErrorCode, StepOutcome,
};
pub use storage::{CreateOutcome, MemoryRegistrationStore, RegistrationStore};
pub use types::{AdvertisementSighting, DeviceAddress, RegistrationRecord};

pub type Result<T> = core::result::Result<T, PairingError>;
