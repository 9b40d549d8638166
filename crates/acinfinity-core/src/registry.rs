//! Address-keyed candidate registry for one pairing session

use std::collections::HashMap;

use tracing::debug;

use crate::advertisement::{identity_from_sighting, DeviceIdentity};
use crate::types::{AdvertisementSighting, DeviceAddress};

// ----------------------------------------------------------------------------
// Candidate
// ----------------------------------------------------------------------------

/// A selectable device as presented to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub address: DeviceAddress,
    /// `"{name} ({address})"`
    pub label: String,
    pub identity: DeviceIdentity,
}

// ----------------------------------------------------------------------------
// Registry
// ----------------------------------------------------------------------------

/// Deduplicating set of sightings, keyed by device address
///
/// Sightings are stored as merged; decoding only happens in [`list`], so a
/// neighbour advertising something else can sit in the map without ever
/// surfacing as a choice.
///
/// [`list`]: CandidateRegistry::list
#[derive(Debug, Clone)]
pub struct CandidateRegistry<H> {
    manufacturer_id: u16,
    sightings: HashMap<DeviceAddress, AdvertisementSighting<H>>,
}

impl<H> CandidateRegistry<H> {
    /// Create an empty registry for the given vendor payload key
    pub fn new(manufacturer_id: u16) -> Self {
        Self {
            manufacturer_id,
            sightings: HashMap::new(),
        }
    }

    /// Insert or refresh a sighting; returns `true` if the address is new
    pub fn merge(&mut self, sighting: AdvertisementSighting<H>) -> bool {
        self.sightings
            .insert(sighting.address.clone(), sighting)
            .is_none()
    }

    /// Sighting held for `address`
    pub fn get(&self, address: &DeviceAddress) -> Option<&AdvertisementSighting<H>> {
        self.sightings.get(address)
    }

    /// Addresses currently held, decodable or not
    pub fn addresses(&self) -> impl Iterator<Item = &DeviceAddress> {
        self.sightings.keys()
    }

    pub fn len(&self) -> usize {
        self.sightings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
    }

    pub fn clear(&mut self) {
        self.sightings.clear();
    }

    /// Decode every held sighting into a selectable candidate
    ///
    /// Sightings that fail to decode and addresses for which `is_registered`
    /// returns `true` are left out. Output is sorted by label for display.
    pub fn list<F>(&self, is_registered: F) -> Vec<Candidate>
    where
        F: Fn(&DeviceAddress) -> bool,
    {
        let mut candidates: Vec<Candidate> = self
            .sightings
            .values()
            .filter(|sighting| !is_registered(&sighting.address))
            .filter_map(|sighting| {
                match identity_from_sighting(sighting, self.manufacturer_id) {
                    Ok(identity) => Some(Candidate {
                        label: format!("{} ({})", identity.name, sighting.address),
                        address: sighting.address.clone(),
                        identity,
                    }),
                    Err(e) => {
                        debug!("Skipping non-candidate {}: {}", sighting.address, e);
                        None
                    }
                }
            })
            .collect();

        candidates.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.address.cmp(&b.address)));
        candidates
    }
}
