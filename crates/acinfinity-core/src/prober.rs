//! Connectivity probing: connect, refresh once, always release

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::errors::{ProbeError, TransportErrorKind};

// ----------------------------------------------------------------------------
// Transport Seam
// ----------------------------------------------------------------------------

/// Connection primitives supplied by the BLE library
#[async_trait]
pub trait DeviceTransport: Send + Sync + 'static {
    /// Handle taken from an advertisement sighting
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;
    /// Open connection
    type Connection: Send + 'static;

    /// Open a connection
    ///
    /// A failed open must leave nothing to release. An open that outlives the
    /// probe's step timeout is still awaited, and its connection closed.
    async fn open(&self, handle: &Self::Handle) -> Result<Self::Connection, ProbeError>;

    /// Perform one state refresh and return the device's current
    /// manufacturer payload
    async fn refresh(&self, connection: &mut Self::Connection) -> Result<Vec<u8>, ProbeError>;

    /// Release the connection; must be safe after any outcome
    async fn close(&self, connection: Self::Connection);
}

// ----------------------------------------------------------------------------
// Prober
// ----------------------------------------------------------------------------

/// Runs short-lived reachability checks against candidates
///
/// Each probe runs on its own task so that the connection is released even if
/// the caller stops waiting for the result.
pub struct ConnectivityProber<T> {
    transport: Arc<T>,
    step_timeout: Duration,
}

impl<T> Clone for ConnectivityProber<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            step_timeout: self.step_timeout,
        }
    }
}

impl<T: DeviceTransport> ConnectivityProber<T> {
    pub fn new(transport: Arc<T>, step_timeout: Duration) -> Self {
        Self {
            transport,
            step_timeout,
        }
    }

    /// Probe the device behind `handle`, returning its refreshed payload
    pub async fn probe(&self, handle: &T::Handle) -> Result<Vec<u8>, ProbeError> {
        let transport = Arc::clone(&self.transport);
        let handle = handle.clone();
        let step_timeout = self.step_timeout;

        let task = tokio::spawn(async move { run_probe(transport, handle, step_timeout).await });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(ProbeError::Unexpected(format!("probe task failed: {}", e))),
        };

        match &result {
            Ok(payload) => debug!("Probe succeeded, refreshed payload {}", hex::encode(payload)),
            Err(ProbeError::Transport(kind)) => warn!("Probe failed: {}", kind),
            Err(ProbeError::Unexpected(detail)) => {
                error!("Unexpected error while probing device: {}", detail)
            }
        }
        result
    }
}

async fn run_probe<T: DeviceTransport>(
    transport: Arc<T>,
    handle: T::Handle,
    step_timeout: Duration,
) -> Result<Vec<u8>, ProbeError> {
    let mut connection = open_guarded(&transport, handle, step_timeout).await?;

    let refreshed = AssertUnwindSafe(timeout(step_timeout, transport.refresh(&mut connection)))
        .catch_unwind()
        .await;

    transport.close(connection).await;

    match refreshed {
        Ok(Ok(result)) => result,
        Ok(Err(_elapsed)) => Err(ProbeError::Transport(TransportErrorKind::Timeout)),
        Err(panic) => Err(ProbeError::Unexpected(panic_message(panic.as_ref()))),
    }
}

/// Open under the step timeout without abandoning a late connection
///
/// The open runs on its own task. If the deadline passes first, the task is
/// left to finish and whatever connection it yields is closed.
async fn open_guarded<T: DeviceTransport>(
    transport: &Arc<T>,
    handle: T::Handle,
    step_timeout: Duration,
) -> Result<T::Connection, ProbeError> {
    let mut open_task = tokio::spawn({
        let transport = Arc::clone(transport);
        async move { transport.open(&handle).await }
    });

    match timeout(step_timeout, &mut open_task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ProbeError::Unexpected(format!("open task failed: {}", e))),
        Err(_) => {
            let transport = Arc::clone(transport);
            tokio::spawn(async move {
                if let Ok(Ok(connection)) = open_task.await {
                    warn!("Connection opened after the probe timed out, releasing it");
                    transport.close(connection).await;
                }
            });
            Err(ProbeError::Transport(TransportErrorKind::Timeout))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("refresh panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("refresh panicked: {}", message)
    } else {
        "refresh panicked".to_string()
    }
}
