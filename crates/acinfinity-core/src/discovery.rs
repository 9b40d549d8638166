//! Seam for the host's advertisement-scanning subsystem

use std::fmt;

use async_trait::async_trait;

use crate::errors::ScanError;
use crate::types::AdvertisementSighting;

/// Pull-style access to currently visible advertisements
///
/// Push-style discovery does not go through this trait: the host hands the
/// single discovered sighting to [`crate::PairingSession::start`] directly.
#[async_trait]
pub trait AdvertisementSource: Send + Sync + 'static {
    /// Backend handle used to open a connection to a sighted device
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Every sighting currently visible to the scanner, unfiltered
    async fn discovered(&self) -> Result<Vec<AdvertisementSighting<Self::Handle>>, ScanError>;
}
