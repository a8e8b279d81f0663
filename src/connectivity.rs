//! Network connectivity checks run before a job is accepted

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// A network transport the host can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Wi-Fi
    Wifi,
    /// Mobile data
    Cellular,
    /// Wired
    Ethernet,
    /// Anything else (VPN, bluetooth tethering, ...); does not count as usable
    Other,
}

impl Transport {
    /// Whether this transport satisfies the network precondition
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            Transport::Wifi | Transport::Cellular | Transport::Ethernet
        )
    }
}

/// Capability check consulted by [`submit`](crate::DownloadOrchestrator::submit)
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Whether at least one usable transport is up
    async fn has_active_transport(&self) -> bool;
}

/// Connectivity reported by the host, e.g. from platform network callbacks
///
/// Cloning shares the underlying state, so the host can keep one clone and
/// update it while the orchestrator holds another.
///
/// # Examples
///
/// ```
/// use audio_dl::connectivity::{Connectivity, StaticConnectivity, Transport};
///
/// # #[tokio::main]
/// # async fn main() {
/// let connectivity = StaticConnectivity::new([Transport::Other]);
/// assert!(!connectivity.has_active_transport().await);
///
/// connectivity.set([Transport::Wifi]);
/// assert!(connectivity.has_active_transport().await);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticConnectivity {
    transports: Arc<RwLock<HashSet<Transport>>>,
}

impl StaticConnectivity {
    /// Start with the given transports up
    pub fn new(transports: impl IntoIterator<Item = Transport>) -> Self {
        Self {
            transports: Arc::new(RwLock::new(transports.into_iter().collect())),
        }
    }

    /// Convenience for an always-online host
    pub fn online() -> Self {
        Self::new([Transport::Wifi])
    }

    /// Convenience for a host with no network
    pub fn offline() -> Self {
        Self::new([])
    }

    /// Replace the set of transports that are up
    pub fn set(&self, transports: impl IntoIterator<Item = Transport>) {
        let next: HashSet<Transport> = transports.into_iter().collect();
        match self.transports.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}

#[async_trait]
impl Connectivity for StaticConnectivity {
    async fn has_active_transport(&self) -> bool {
        match self.transports.read() {
            Ok(guard) => guard.iter().any(|t| t.is_usable()),
            Err(poisoned) => poisoned.into_inner().iter().any(|t| t.is_usable()),
        }
    }
}

/// Connectivity probed by opening a TCP connection, for desktop hosts
#[derive(Debug, Clone)]
pub struct ProbeConnectivity {
    address: String,
    timeout: Duration,
}

impl ProbeConnectivity {
    /// Probe `address` (`host:port`) with the given timeout
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

impl Default for ProbeConnectivity {
    fn default() -> Self {
        Self::new("www.youtube.com:443", Duration::from_secs(3))
    }
}

#[async_trait]
impl Connectivity for ProbeConnectivity {
    async fn has_active_transport(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(self.address.as_str());
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(address = %self.address, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(address = %self.address, "Connectivity probe timed out");
                false
            }
        }
    }
}
