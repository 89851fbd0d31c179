//! Discovery scan service
//!
//! A scan cycle runs three workers side by side:
//!
//! - **scan**: filters and dedups service advertisements into server results
//! - **player fan-out**: follows the player lists of every registered server
//! - **sign fan-out**: follows the sign lists of every registered server
//!
//! plus a timer that ends the cycle after the scan timeout. All results pass
//! through one [`ScanGate`]; closing the gate is the first step of every
//! teardown, so once [`DiscoveryService::stop_scan`] returns no result of that
//! cycle can reach the sink.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use craftlink_stream::{Endpoint, Follow, Player, ServerRegistry, Sign};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::ids::{ThingType, ThingUid};
use crate::result::{DiscoveryResult, DiscoverySink};
use crate::source::{DiscoverySource, ServiceEvent};

/// Discovers servers, players and signs on demand
pub struct DiscoveryService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    registry: Arc<ServerRegistry>,
    source: Arc<dyn DiscoverySource>,
    sink: Arc<dyn DiscoverySink>,
    config: DiscoveryConfig,
    scan: tokio::sync::Mutex<Option<ScanCycle>>,
    scanning: AtomicBool,
    cycles: AtomicU64,
}

impl DiscoveryService {
    pub fn new(
        registry: Arc<ServerRegistry>,
        source: Arc<dyn DiscoverySource>,
        sink: Arc<dyn DiscoverySink>,
        config: DiscoveryConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(ServiceInner {
                registry,
                source,
                sink,
                config,
                scan: tokio::sync::Mutex::new(None),
                scanning: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// Start a scan that ends on its own after `timeout`
    ///
    /// A scan already running is stopped first. Player and sign fan-outs cover
    /// the servers registered at the time of the call.
    pub async fn start_scan(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(DiscoveryError::Configuration(
                "scan timeout must be greater than 0".to_string(),
            ));
        }

        let mut scan = self.inner.scan.lock().await;

        if let Some(previous) = scan.take() {
            debug!(scan = previous.id, "Cancelling running scan");
            previous.shutdown().await;
        }

        // a new cycle may report servers that were not added after the last one
        self.inner.registry.release_claims();

        let id = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = Arc::new(ScanGate::new(Arc::clone(&self.inner.sink)));

        let mut players = Vec::new();
        let mut signs = Vec::new();
        for entry in self.inner.registry.servers() {
            let uid = match entry.id.parse::<ThingUid>() {
                Ok(uid) if uid.thing_type() == ThingType::Server => uid,
                _ => {
                    debug!(server = %entry.id, "Skipping registry entry without a server uid");
                    continue;
                }
            };

            let subscription = entry.stream.subscribe();
            players.push((uid.clone(), subscription.players()));
            signs.push((uid, subscription.signs()));
        }

        let servers = players.len();
        let tasks = vec![
            (
                "scan",
                tokio::spawn(scan_servers(
                    Arc::clone(&self.inner.source),
                    self.inner.config.service_name.clone(),
                    Arc::clone(&self.inner.registry),
                    Arc::clone(&gate),
                )),
            ),
            (
                "players",
                tokio::spawn(fan_out("players", players, Arc::clone(&gate), report_player)),
            ),
            (
                "signs",
                tokio::spawn(fan_out("signs", signs, Arc::clone(&gate), report_sign)),
            ),
            (
                "timer",
                tokio::spawn(expire(Arc::downgrade(&self.inner), id, timeout)),
            ),
        ];

        *scan = Some(ScanCycle { id, gate, tasks });
        self.inner.scanning.store(true, Ordering::SeqCst);

        info!(scan = id, servers, timeout = ?timeout, "Discovery scan started");
        Ok(())
    }

    /// Start a scan with the configured timeout
    pub async fn start_default_scan(&self) -> Result<()> {
        self.start_scan(self.inner.config.scan_timeout).await
    }

    /// Stop the running scan
    ///
    /// Returns once every worker of the cycle has finished and its
    /// subscriptions are released.
    pub async fn stop_scan(&self) {
        let mut scan = self.inner.scan.lock().await;

        match scan.take() {
            Some(cycle) => {
                let id = cycle.id;
                cycle.shutdown().await;
                self.inner.scanning.store(false, Ordering::SeqCst);
                info!(scan = id, "Discovery scan stopped");
            }
            None => debug!("No discovery scan running"),
        }
    }

    /// Whether a scan cycle is live
    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DiscoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryService")
            .field("config", &self.inner.config)
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

/// Ends the cycle `id` after `timeout`, unless it was stopped or replaced
async fn expire(inner: Weak<ServiceInner>, id: u64, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };

    let mut scan = inner.scan.lock().await;
    if scan.as_ref().map(|cycle| cycle.id) != Some(id) {
        return;
    }

    if let Some(mut cycle) = scan.take() {
        // this task is the timer; it must not wait for itself
        cycle.detach("timer");
        cycle.shutdown().await;
        inner.scanning.store(false, Ordering::SeqCst);
        info!(scan = id, "Discovery scan timed out");
    }
}

/// Workers and gate of one scan cycle
struct ScanCycle {
    id: u64,
    gate: Arc<ScanGate>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ScanCycle {
    fn detach(&mut self, name: &str) {
        self.tasks.retain(|(task, _)| *task != name);
    }

    async fn shutdown(mut self) {
        self.gate.close();

        let tasks = std::mem::take(&mut self.tasks);
        for (_, handle) in &tasks {
            handle.abort();
        }

        for (name, handle) in tasks {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!(scan = self.id, task = name, error = %e, "Scan task failed"),
            }
        }

        debug!(scan = self.id, reported = self.gate.reported(), "Scan cycle torn down");
    }
}

impl Drop for ScanCycle {
    fn drop(&mut self) {
        self.gate.close();
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}

/// Single exit for the results of one scan cycle
///
/// Emission holds the read side of the lock and closing takes the write side,
/// so `close` waits for an emission in progress and no emission starts after.
struct ScanGate {
    open: RwLock<bool>,
    sink: Arc<dyn DiscoverySink>,
    reported: Mutex<HashSet<ThingUid>>,
}

impl ScanGate {
    fn new(sink: Arc<dyn DiscoverySink>) -> Self {
        Self {
            open: RwLock::new(true),
            sink,
            reported: Mutex::new(HashSet::new()),
        }
    }

    /// Report `result` unless the gate is closed or it was reported this cycle
    fn emit(&self, result: DiscoveryResult) -> bool {
        let open = self.open.read();
        if !*open {
            return false;
        }

        if !self.reported.lock().insert(result.uid.clone()) {
            return false;
        }

        self.sink.thing_discovered(result);
        true
    }

    fn close(&self) {
        *self.open.write() = false;
    }

    fn reported(&self) -> usize {
        self.reported.lock().len()
    }
}

/// Turn matching advertisements into server results
async fn scan_servers(
    source: Arc<dyn DiscoverySource>,
    service_name: String,
    registry: Arc<ServerRegistry>,
    gate: Arc<ScanGate>,
) {
    let mut events = match source.browse().await {
        Ok(events) => events,
        Err(e) => {
            error!(error = %e, "Error while scanning for servers");
            return;
        }
    };

    let mut last: Option<ServiceEvent> = None;

    while let Some(event) = events.next().await {
        if event.name != service_name {
            trace!(service = %event.name, "Ignoring advertisement");
            continue;
        }

        if last.as_ref() == Some(&event) {
            continue;
        }
        last = Some(event.clone());

        let Some(address) = event.primary_address() else {
            warn!(service = %event.name, "Advertisement without a resolved address");
            continue;
        };

        let host = address.to_string();
        let result = DiscoveryResult::server(&host, event.port);
        let endpoint = Endpoint::new(host, event.port);

        if !registry.claim_discovery(&result.uid.to_string(), &endpoint) {
            continue;
        }

        let uid = result.uid.clone();
        if gate.emit(result) {
            info!(uid = %uid, endpoint = %endpoint, "Server discovered");
        }
    }

    debug!("Discovery listener ended");
}

/// Report every element of every snapshot from the followed servers
async fn fan_out<T>(
    kind: &'static str,
    follows: Vec<(ThingUid, Follow<Vec<T>>)>,
    gate: Arc<ScanGate>,
    report: fn(&ThingUid, &T) -> DiscoveryResult,
) where
    T: Clone + Send + Sync + 'static,
{
    let streams = follows.into_iter().map(|(bridge, follow)| {
        follow
            .into_stream()
            .map(move |items| (bridge.clone(), items))
            .boxed()
    });
    let mut merged = stream::select_all(streams);

    while let Some((bridge, items)) = merged.next().await {
        for item in &items {
            let result = report(&bridge, item);
            let uid = result.uid.clone();
            if gate.emit(result) {
                debug!(kind, uid = %uid, bridge = %bridge, "Thing discovered");
            }
        }
    }

    debug!(kind, "Fan-out ended");
}

fn report_player(bridge: &ThingUid, player: &Player) -> DiscoveryResult {
    DiscoveryResult::player(bridge, &player.name)
}

fn report_sign(bridge: &ThingUid, sign: &Sign) -> DiscoveryResult {
    DiscoveryResult::sign(bridge, &sign.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_gate_dedups_within_cycle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = ScanGate::new(Arc::new(tx));
        let server = ThingUid::server_for_host("10.0.0.5");

        assert!(gate.emit(DiscoveryResult::player(&server, "Alice")));
        assert!(!gate.emit(DiscoveryResult::player(&server, "Alice")));
        assert!(gate.emit(DiscoveryResult::sign(&server, "Alice")));
        assert_eq!(gate.reported(), 2);

        gate.close();
        assert!(!gate.emit(DiscoveryResult::player(&server, "Bob")));

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }
}
