//! EIP-6963 wallet discovery.
//!
//! The client broadcasts a single request and collects announcements until a
//! deadline; wallets answer every request they see. The bus stands in for the
//! host's event target.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::provider::Eip1193Provider;

pub const REQUEST_PROVIDER_EVENT: &str = "eip6963:requestProvider";
pub const ANNOUNCE_PROVIDER_EVENT: &str = "eip6963:announceProvider";

const BUS_CAPACITY: usize = 64;

/// Wallet metadata carried by an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub uuid: String,
    pub name: String,
    /// Data URI of the wallet icon.
    pub icon: String,
    /// Reverse-DNS wallet identifier, e.g. `io.metamask`.
    pub rdns: String,
}

#[derive(Clone)]
pub struct ProviderDetail {
    pub info: ProviderInfo,
    pub provider: Arc<dyn Eip1193Provider>,
}

impl fmt::Debug for ProviderDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDetail")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    RequestProvider,
    AnnounceProvider(ProviderDetail),
}

impl DiscoveryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DiscoveryEvent::RequestProvider => REQUEST_PROVIDER_EVENT,
            DiscoveryEvent::AnnounceProvider(_) => ANNOUNCE_PROVIDER_EVENT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryBus {
    sender: broadcast::Sender<DiscoveryEvent>,
}

impl Default for DiscoveryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.sender.subscribe()
    }

    /// Dispatches `event`; returns how many listeners saw it.
    pub fn dispatch(&self, event: DiscoveryEvent) -> usize {
        debug!(event = event.name(), "dispatch");
        // No listeners is not an error for a fire-and-forget event.
        self.sender.send(event).unwrap_or(0)
    }
}

/// Wallet side: answers every request on `bus` with `detail`, and announces
/// once up front, until the bus closes or the task is aborted.
pub fn announce_on_request(bus: &DiscoveryBus, detail: ProviderDetail) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    let bus = bus.clone();
    bus.dispatch(DiscoveryEvent::AnnounceProvider(detail.clone()));

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DiscoveryEvent::RequestProvider) => {
                    bus.dispatch(DiscoveryEvent::AnnounceProvider(detail.clone()));
                }
                Ok(DiscoveryEvent::AnnounceProvider(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, wallet = %detail.info.name, "discovery listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Client side: requests providers and collects announcements until
/// `timeout` elapses, one per wallet uuid, in announcement order.
pub async fn request_providers(bus: &DiscoveryBus, timeout: Duration) -> Vec<ProviderDetail> {
    let mut events = bus.subscribe();
    let deadline = Instant::now() + timeout;
    bus.dispatch(DiscoveryEvent::RequestProvider);

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_elapsed) => break,
            Ok(Ok(DiscoveryEvent::AnnounceProvider(detail))) => {
                if seen.insert(detail.info.uuid.clone()) {
                    info!(
                        name = %detail.info.name,
                        rdns = %detail.info.rdns,
                        uuid = %detail.info.uuid,
                        "wallet announced"
                    );
                    found.push(detail);
                }
            }
            Ok(Ok(DiscoveryEvent::RequestProvider)) => {}
            Ok(Err(RecvError::Lagged(skipped))) => {
                warn!(skipped, "missed discovery announcements");
            }
            Ok(Err(RecvError::Closed)) => break,
        }
    }

    debug!(count = found.len(), "discovery finished");
    found
}
