//! Discovery event sources
//!
//! A source turns local-network service advertisements into a stream of
//! [`ServiceEvent`]s. The stream owns the listener: dropping it releases the
//! listener again.

use std::net::IpAddr;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, Result};

/// A resolved service advertisement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEvent {
    /// Advertised service name
    pub name: String,
    /// Resolved host addresses, in resolution order
    pub addresses: Vec<IpAddr>,
    pub port: u16,
}

impl ServiceEvent {
    pub fn new(name: impl Into<String>, addresses: Vec<IpAddr>, port: u16) -> Self {
        Self {
            name: name.into(),
            addresses,
            port,
        }
    }

    /// The address discovery connects to
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// Stream of service events for one browse session
pub type ServiceEventStream = BoxStream<'static, ServiceEvent>;

/// Source of service advertisements
#[async_trait]
pub trait DiscoverySource: Send + Sync + 'static {
    /// Start listening for advertisements
    async fn browse(&self) -> Result<ServiceEventStream>;
}

const DEFAULT_CAPACITY: usize = 64;

/// Broadcast-backed source for embedding an external listener
///
/// Whatever feeds advertisements calls [`ChannelDiscoverySource::announce`];
/// every active browse session receives them.
pub struct ChannelDiscoverySource {
    tx: broadcast::Sender<ServiceEvent>,
    failure: Mutex<Option<String>>,
}

impl ChannelDiscoverySource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            failure: Mutex::new(None),
        }
    }

    /// Publish an advertisement, returning how many sessions received it
    pub fn announce(&self, event: ServiceEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of live browse sessions
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Make subsequent browse calls fail with `reason`
    pub fn fail_browsing(&self, reason: impl Into<String>) {
        *self.failure.lock() = Some(reason.into());
    }

    /// Let browse calls succeed again
    pub fn restore(&self) {
        *self.failure.lock() = None;
    }
}

impl Default for ChannelDiscoverySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoverySource for ChannelDiscoverySource {
    async fn browse(&self) -> Result<ServiceEventStream> {
        if let Some(reason) = self.failure.lock().clone() {
            return Err(DiscoveryError::Listener(reason));
        }

        debug!("Discovery listener started");
        let rx = self.tx.subscribe();

        Ok(stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Discovery listener lagged, advertisements dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn event(last: u8) -> ServiceEvent {
        ServiceEvent::new(
            "wc-minecraft",
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))],
            10692,
        )
    }

    #[tokio::test]
    async fn test_browse_receives_announcements() {
        let source = ChannelDiscoverySource::new();
        assert_eq!(source.announce(event(1)), 0);

        let mut events = source.browse().await.unwrap();
        assert_eq!(source.listener_count(), 1);
        assert_eq!(source.announce(event(2)), 1);

        assert_eq!(events.next().await, Some(event(2)));

        drop(events);
        assert_eq!(source.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_browse_failure() {
        let source = ChannelDiscoverySource::new();
        source.fail_browsing("multicast unavailable");

        let err = source.browse().await.err().unwrap();
        assert!(matches!(err, DiscoveryError::Listener(_)));
        assert_eq!(source.listener_count(), 0);

        source.restore();
        assert!(source.browse().await.is_ok());
    }

    #[test]
    fn test_primary_address() {
        let mut e = event(5);
        e.addresses.push(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)));
        assert_eq!(e.primary_address(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));

        e.addresses.clear();
        assert_eq!(e.primary_address(), None);
    }
}
