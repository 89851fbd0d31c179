//! Integration tests for the discovery service.
//!
//! These tests verify:
//! - server results from advertisements, with registry dedup and id hygiene
//! - player and sign fan-out over registered servers
//! - scan teardown on stop, on timeout and on restart
//! - a failing discovery listener leaving the fan-outs running

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use craftlink_discovery::{
    ChannelDiscoverySource, DiscoveryConfig, DiscoveryError, DiscoveryResult, DiscoveryService,
    ServiceEvent, ThingType, ThingUid, PROPERTY_HOSTNAME, PROPERTY_PORT,
};
use craftlink_stream::testing::{players, signs, wait_for, MockConnector};
use craftlink_stream::{Endpoint, ServerRegistry, SharedServerStream, StreamConfig};

const SCAN_TIMEOUT: Duration = Duration::from_secs(60);

struct Harness {
    connector: Arc<MockConnector>,
    registry: Arc<ServerRegistry>,
    source: Arc<ChannelDiscoverySource>,
    discovery: DiscoveryService,
    results: mpsc::UnboundedReceiver<DiscoveryResult>,
}

fn harness() -> Harness {
    let connector = MockConnector::new();
    let config = StreamConfig::default().with_retry_delay(Duration::from_millis(20));
    let registry = Arc::new(ServerRegistry::new(connector.clone(), config).expect("registry"));
    let source = Arc::new(ChannelDiscoverySource::new());
    let (tx, results) = mpsc::unbounded_channel();

    let discovery = DiscoveryService::new(
        Arc::clone(&registry),
        source.clone(),
        Arc::new(tx),
        DiscoveryConfig::default(),
    )
    .expect("discovery");

    Harness {
        connector,
        registry,
        source,
        discovery,
        results,
    }
}

impl Harness {
    fn register(&self, host: &str) -> (ThingUid, Endpoint, SharedServerStream) {
        let uid = ThingUid::server_for_host(host);
        let endpoint = Endpoint::new(host, 10692);
        let stream = self
            .registry
            .register(uid.to_string(), endpoint.clone())
            .expect("register");
        (uid, endpoint, stream)
    }

    async fn next_result(&mut self) -> DiscoveryResult {
        tokio::time::timeout(Duration::from_secs(2), self.results.recv())
            .await
            .expect("timed out waiting for a discovery result")
            .expect("sink closed")
    }

    fn announce(&self, name: &str, last_octet: u8) -> usize {
        self.source.announce(ServiceEvent::new(
            name,
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet))],
            10692,
        ))
    }
}

#[tokio::test]
async fn test_discovered_server_id_has_no_dots() {
    let mut h = harness();
    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;

    h.announce("wc-minecraft", 5);

    let result = h.next_result().await;
    assert_eq!(result.uid.thing_type(), ThingType::Server);
    assert!(!result.uid.id().contains('.'));
    assert_eq!(result.uid.to_string(), "minecraft:server:10_0_0_5");
    assert_eq!(result.property(PROPERTY_HOSTNAME), Some(&"10.0.0.5".into()));
    assert_eq!(result.property(PROPERTY_PORT), Some(&10692.into()));
    assert!(result.bridge.is_none());
}

#[tokio::test]
async fn test_advertisements_are_filtered_and_deduplicated() {
    let mut h = harness();
    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;

    h.announce("other-service", 7);
    h.announce("wc-minecraft", 8);
    h.announce("wc-minecraft", 8);
    h.announce("wc-minecraft", 9);

    assert_eq!(h.next_result().await.uid.id(), "10_0_0_8");
    assert_eq!(h.next_result().await.uid.id(), "10_0_0_9");
    assert!(h.results.try_recv().is_err());
}

#[tokio::test]
async fn test_registered_server_is_not_rediscovered() {
    let mut h = harness();
    h.register("10.0.0.5");

    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;

    h.announce("wc-minecraft", 5);
    h.announce("wc-minecraft", 6);

    // the first result is the unregistered server
    let result = h.next_result().await;
    assert_eq!(result.uid.id(), "10_0_0_6");
    assert!(h.results.try_recv().is_err());
}

#[tokio::test]
async fn test_players_reported_once_per_scan() {
    let mut h = harness();
    let (server, endpoint, _stream) = h.register("10.0.0.5");

    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.connector.opens() == 1).await;

    h.connector.send_to(&endpoint, players(&["Alice"]));
    let alice = h.next_result().await;
    assert_eq!(alice.uid, ThingUid::child(ThingType::Player, &server, "Alice"));
    assert_eq!(alice.bridge.as_ref(), Some(&server));
    assert_eq!(alice.label, "Minecraft Player (Alice)");

    h.connector.send_to(&endpoint, players(&["Alice", "Bob"]));
    let bob = h.next_result().await;
    assert_eq!(bob.uid, ThingUid::child(ThingType::Player, &server, "Bob"));

    // a sign result proves nothing else was queued in between
    h.connector.send_to(&endpoint, signs(&["door"]));
    let door = h.next_result().await;
    assert_eq!(door.uid, ThingUid::child(ThingType::Sign, &server, "door"));
    assert_eq!(door.bridge.as_ref(), Some(&server));

    assert!(h.results.try_recv().is_err());
}

#[tokio::test]
async fn test_stop_scan_releases_everything() {
    let mut h = harness();
    let (_, endpoint, stream) = h.register("10.0.0.5");

    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    assert!(h.discovery.is_scanning());
    wait_for(|| h.source.listener_count() == 1 && h.connector.opens() == 1).await;
    assert_eq!(stream.subscriber_count(), 1);

    h.discovery.stop_scan().await;

    assert!(!h.discovery.is_scanning());
    assert_eq!(h.source.listener_count(), 0);
    assert_eq!(stream.subscriber_count(), 0);
    assert!(!stream.is_active());

    assert_eq!(h.announce("wc-minecraft", 9), 0);
    h.connector.send_to(&endpoint, players(&["Alice"]));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.results.try_recv().is_err());

    // stopping again is harmless
    h.discovery.stop_scan().await;
}

#[tokio::test]
async fn test_listener_failure_keeps_fan_outs_running() {
    let mut h = harness();
    let (server, endpoint, _stream) = h.register("10.0.0.5");
    h.source.fail_browsing("multicast unavailable");

    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.connector.opens() == 1).await;

    h.connector.send_to(&endpoint, players(&["Alice"]));
    let alice = h.next_result().await;
    assert_eq!(alice.bridge, Some(server));

    assert!(h.discovery.is_scanning());
    assert_eq!(h.source.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scan_times_out() {
    let h = harness();
    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;

    tokio::time::sleep(SCAN_TIMEOUT + Duration::from_secs(1)).await;

    wait_for(|| !h.discovery.is_scanning()).await;
    assert_eq!(h.source.listener_count(), 0);
}

#[tokio::test]
async fn test_restart_replaces_running_scan() {
    let mut h = harness();
    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;

    h.announce("wc-minecraft", 8);
    assert_eq!(h.next_result().await.uid.id(), "10_0_0_8");

    h.discovery.start_scan(SCAN_TIMEOUT).await.unwrap();
    wait_for(|| h.source.listener_count() == 1).await;
    assert!(h.discovery.is_scanning());

    // a new cycle reports servers that were never added
    h.announce("wc-minecraft", 8);
    assert_eq!(h.next_result().await.uid.id(), "10_0_0_8");
}

#[tokio::test]
async fn test_invalid_scan_settings() {
    let h = harness();
    assert!(matches!(
        h.discovery.start_scan(Duration::ZERO).await,
        Err(DiscoveryError::Configuration(_))
    ));
    assert!(!h.discovery.is_scanning());

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = DiscoveryService::new(
        Arc::clone(&h.registry),
        h.source.clone(),
        Arc::new(tx),
        DiscoveryConfig::default().with_service_name(""),
    )
    .unwrap_err();
    assert!(matches!(err, DiscoveryError::Configuration(_)));
}
