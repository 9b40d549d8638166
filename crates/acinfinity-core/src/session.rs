//! Pairing state machine
//!
//! ```text
//! START ──start()──► AWAIT_SELECTION ──select()──► VERIFYING ──► DONE
//!   │                    ▲                            │
//!   │                    └──── probe failed ──────────┘
//!   └──────────────► ABORTED (already configured, no devices, ...)
//! ```
//!
//! Both entry paths, a pushed discovery and a manual listing, converge on the
//! same candidate presentation and the same verification step. A registration
//! is only ever emitted after a successful probe of the selected address in
//! this session.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::advertisement::{decode, identity_from_sighting, DeviceIdentity};
use crate::config::{EmptyScanPolicy, PairingConfig};
use crate::discovery::AdvertisementSource;
use crate::errors::{PairingError, ProbeError};
use crate::prober::{ConnectivityProber, DeviceTransport};
use crate::registry::{Candidate, CandidateRegistry};
use crate::storage::{CreateOutcome, RegistrationStore};
use crate::types::{AdvertisementSighting, DeviceAddress, RegistrationRecord};
use crate::Result;

// ----------------------------------------------------------------------------
// Session Types
// ----------------------------------------------------------------------------

/// How a session was entered
#[derive(Debug, Clone)]
pub enum SessionEntry<H> {
    /// A single sighting delivered by the scanner's discovery callback
    Push(AdvertisementSighting<H>),
    /// Operator-initiated listing of everything currently visible
    Manual,
}

/// Why a session ended without a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The device already has a registration
    AlreadyConfigured,
    /// Manual enumeration produced nothing selectable
    NoDevicesFound,
    /// A pushed sighting did not carry a decodable vendor payload
    NotSupported,
    /// The caller abandoned the session
    Cancelled,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyConfigured => "already_configured",
            Self::NoDevicesFound => "no_devices_found",
            Self::NotSupported => "not_supported",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error annotation shown alongside the re-presented candidate list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorCode {
    CannotConnect,
    Unknown,
}

impl SessionErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CannotConnect => "cannot_connect",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&ProbeError> for SessionErrorCode {
    fn from(err: &ProbeError) -> Self {
        match err {
            ProbeError::Transport(_) => Self::CannotConnect,
            ProbeError::Unexpected(_) => Self::Unknown,
        }
    }
}

impl fmt::Display for SessionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current position in the pairing flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Start,
    AwaitingSelection,
    Verifying,
    Done,
    Aborted(AbortReason),
}

impl PairingState {
    /// Whether no further step is accepted
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted(_))
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::AwaitingSelection => f.write_str("awaiting selection"),
            Self::Verifying => f.write_str("verifying"),
            Self::Done => f.write_str("done"),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// What the caller should do or show after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Present these candidates, with the last probe failure if any
    ShowCandidates {
        candidates: Vec<Candidate>,
        error: Option<SessionErrorCode>,
    },
    /// The device was verified and registered
    Completed(RegistrationRecord),
    /// The session ended without a registration
    Aborted(AbortReason),
}

// ----------------------------------------------------------------------------
// Pairing Session
// ----------------------------------------------------------------------------

/// One pairing attempt, owned by a single caller
pub struct PairingSession<S: AdvertisementSource, T, R> {
    config: PairingConfig,
    source: Arc<S>,
    prober: ConnectivityProber<T>,
    store: Arc<R>,
    state: PairingState,
    push_discovered: Option<AdvertisementSighting<S::Handle>>,
    candidates: CandidateRegistry<S::Handle>,
    last_error: Option<SessionErrorCode>,
    title_name: Option<String>,
}

impl<S, T, R> PairingSession<S, T, R>
where
    S: AdvertisementSource,
    T: DeviceTransport<Handle = S::Handle>,
    R: RegistrationStore,
{
    pub fn new(config: PairingConfig, source: Arc<S>, transport: Arc<T>, store: Arc<R>) -> Self {
        let prober = ConnectivityProber::new(transport, config.probe_timeout);
        let candidates = CandidateRegistry::new(config.manufacturer_id);
        Self {
            config,
            source,
            prober,
            store,
            state: PairingState::Start,
            push_discovered: None,
            candidates,
            last_error: None,
            title_name: None,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    /// Failure annotation from the most recent verification attempt
    pub fn last_error(&self) -> Option<SessionErrorCode> {
        self.last_error
    }

    /// Name of the pushed device, for titling the presentation
    pub fn title_name(&self) -> Option<&str> {
        self.title_name.as_deref()
    }

    /// Begin the flow from either entry path
    pub async fn start(&mut self, entry: SessionEntry<S::Handle>) -> Result<StepOutcome> {
        self.ensure_state(PairingState::Start, "start")?;

        self.candidates.clear();
        self.push_discovered = None;
        self.last_error = None;
        self.title_name = None;

        match entry {
            SessionEntry::Push(sighting) => {
                if self.store.is_registered(&sighting.address).await? {
                    info!("Discovered {} is already configured", sighting.address);
                    return Ok(self.abort_with(AbortReason::AlreadyConfigured));
                }
                match identity_from_sighting(&sighting, self.config.manufacturer_id) {
                    Ok(identity) => {
                        info!("Discovered {} at {}", identity.name, sighting.address);
                        self.title_name = Some(identity.name);
                    }
                    Err(e) => {
                        warn!("Discovered {} is not supported: {}", sighting.address, e);
                        return Ok(self.abort_with(AbortReason::NotSupported));
                    }
                }
                self.candidates.merge(sighting.clone());
                self.push_discovered = Some(sighting);
            }
            SessionEntry::Manual => {
                self.enumerate().await?;
            }
        }

        self.show_candidates().await
    }

    /// Selectable candidates as they would be presented now
    pub async fn candidates(&self) -> Result<Vec<Candidate>> {
        self.visible_candidates().await
    }

    /// Run another discovery pass on a manually started session
    pub async fn rescan(&mut self) -> Result<StepOutcome> {
        self.ensure_state(PairingState::AwaitingSelection, "rescan")?;
        if self.push_discovered.is_some() {
            return Err(PairingError::RescanUnavailable);
        }

        self.last_error = None;
        self.enumerate().await?;
        self.show_candidates().await
    }

    /// Verify and register the candidate at `address`
    pub async fn select(&mut self, address: &DeviceAddress) -> Result<StepOutcome> {
        self.ensure_state(PairingState::AwaitingSelection, "select")?;

        let (sighting, advertised) = self
            .candidates
            .get(address)
            .and_then(|sighting| {
                identity_from_sighting(sighting, self.config.manufacturer_id)
                    .ok()
                    .map(|identity| (sighting.clone(), identity))
            })
            .ok_or_else(|| PairingError::UnknownCandidate {
                address: address.clone(),
            })?;

        // Another session may have registered this device since listing.
        if self.store.is_registered(address).await? {
            info!("{} was configured since it was listed", address);
            return Ok(self.abort_with(AbortReason::AlreadyConfigured));
        }

        self.state = PairingState::Verifying;
        info!("Verifying connectivity to {} ({})", advertised.name, address);

        match self.prober.probe(&sighting.handle).await {
            Ok(refreshed) => self.complete(sighting.address, advertised, &refreshed).await,
            Err(e) => {
                let code = SessionErrorCode::from(&e);
                warn!("Verification of {} failed ({}): {}", address, code, e);
                self.last_error = Some(code);
                self.state = PairingState::AwaitingSelection;
                self.show_candidates().await
            }
        }
    }

    /// Abandon the session
    ///
    /// A probe still in flight keeps running until it has released its
    /// connection.
    pub fn abort(&mut self) -> Result<StepOutcome> {
        if self.state.is_terminal() {
            return Err(PairingError::InvalidState {
                operation: "abort",
                state: self.state,
            });
        }
        Ok(self.abort_with(AbortReason::Cancelled))
    }

    // ------------------------------------------------------------------------
    // Internal Steps
    // ------------------------------------------------------------------------

    async fn complete(
        &mut self,
        address: DeviceAddress,
        advertised: DeviceIdentity,
        refreshed: &[u8],
    ) -> Result<StepOutcome> {
        let identity = match decode(refreshed) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(
                    "Refreshed payload from {} did not decode ({}), keeping advertised identity",
                    address, e
                );
                advertised
            }
        };

        let record = RegistrationRecord {
            address,
            display_name: identity.name.clone(),
            identity,
        };

        let outcome = match self.store.create_registration(record.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = PairingState::AwaitingSelection;
                return Err(e.into());
            }
        };

        match outcome {
            CreateOutcome::Created => {
                info!("Paired {} ({})", record.display_name, record.address);
                self.state = PairingState::Done;
                self.last_error = None;
                self.candidates.clear();
                self.push_discovered = None;
                Ok(StepOutcome::Completed(record))
            }
            CreateOutcome::AlreadyExists => {
                info!("{} was configured during verification", record.address);
                Ok(self.abort_with(AbortReason::AlreadyConfigured))
            }
        }
    }

    async fn enumerate(&mut self) -> Result<()> {
        let sightings = self.source.discovered().await?;
        let seen = sightings.len();
        let mut merged = 0usize;

        for sighting in sightings {
            if !sighting.advertises(self.config.manufacturer_id) {
                continue;
            }
            if self.store.is_registered(&sighting.address).await? {
                debug!("Skipping configured device {}", sighting.address);
                continue;
            }
            if self.candidates.merge(sighting) {
                merged += 1;
            }
        }

        debug!(
            "Enumeration saw {} sighting(s), {} new candidate address(es)",
            seen, merged
        );
        Ok(())
    }

    async fn visible_candidates(&self) -> Result<Vec<Candidate>> {
        let addresses: Vec<DeviceAddress> = self.candidates.addresses().cloned().collect();
        let mut registered = HashSet::new();
        for address in addresses {
            if self.store.is_registered(&address).await? {
                registered.insert(address);
            }
        }
        Ok(self.candidates.list(|address| registered.contains(address)))
    }

    async fn show_candidates(&mut self) -> Result<StepOutcome> {
        let candidates = self.visible_candidates().await?;

        if candidates.is_empty() {
            if self.push_discovered.is_some() {
                return Ok(self.abort_with(AbortReason::AlreadyConfigured));
            }
            return Ok(self.no_devices_found());
        }

        self.state = PairingState::AwaitingSelection;
        Ok(StepOutcome::ShowCandidates {
            candidates,
            error: self.last_error,
        })
    }

    fn no_devices_found(&mut self) -> StepOutcome {
        match self.config.empty_scan_policy {
            EmptyScanPolicy::Abort => self.abort_with(AbortReason::NoDevicesFound),
            EmptyScanPolicy::AllowRescan => {
                info!("No devices found, session may be restarted");
                self.candidates.clear();
                self.last_error = None;
                self.state = PairingState::Start;
                StepOutcome::Aborted(AbortReason::NoDevicesFound)
            }
        }
    }

    fn abort_with(&mut self, reason: AbortReason) -> StepOutcome {
        info!("Pairing aborted: {}", reason);
        self.state = PairingState::Aborted(reason);
        self.candidates.clear();
        self.push_discovered = None;
        StepOutcome::Aborted(reason)
    }

    fn ensure_state(&self, expected: PairingState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(PairingError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }
}
