//! Server registry
//!
//! The registry is the single place that maps a server's identity to its
//! endpoint and shared stream. It is created explicitly, passed around by
//! `Arc`, and torn down with [`ServerRegistry::clear`].
//!
//! All bookkeeping sits behind one lock so that "is this server known?" and
//! "remember that it is now known" happen atomically, both for registrations
//! and for discovery claims.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::connector::Connector;
use crate::endpoint::Endpoint;
use crate::error::{RegistryError, RegistryResult, Result};
use crate::hub::SharedServerStream;

/// A registered server
#[derive(Clone)]
pub struct ServerEntry {
    /// Identity of the server (its thing uid)
    pub id: String,
    pub endpoint: Endpoint,
    /// Shared stream backing every consumer of this server
    pub stream: SharedServerStream,
}

impl std::fmt::Debug for ServerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEntry")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("subscribers", &self.stream.subscriber_count())
            .finish()
    }
}

/// Thread-safe registry of servers with endpoint uniqueness
pub struct ServerRegistry {
    connector: Arc<dyn Connector>,
    config: StreamConfig,
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    servers: HashMap<String, ServerEntry>,
    /// Identities already reported by discovery but not registered yet
    claimed: HashSet<String>,
}

impl RegistryState {
    fn owner_of(&self, endpoint: &Endpoint) -> Option<&ServerEntry> {
        self.servers.values().find(|entry| &entry.endpoint == endpoint)
    }
}

impl ServerRegistry {
    /// Create an empty registry whose servers connect through `connector`
    pub fn new(connector: Arc<dyn Connector>, config: StreamConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            connector,
            config,
            state: Mutex::new(RegistryState::default()),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Register a server and create its shared stream
    ///
    /// The stream is idle until its first subscription. Fails if the identity
    /// or the endpoint is already registered.
    pub fn register(
        &self,
        id: impl Into<String>,
        endpoint: Endpoint,
    ) -> RegistryResult<SharedServerStream> {
        let id = id.into();
        let mut state = self.state.lock();

        if state.servers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        if let Some(owner) = state.owner_of(&endpoint) {
            return Err(RegistryError::EndpointInUse {
                endpoint,
                owner: owner.id.clone(),
            });
        }

        let stream = SharedServerStream::new(
            endpoint.clone(),
            Arc::clone(&self.connector),
            &self.config,
        )?;

        info!(server = %id, endpoint = %endpoint, "Server registered");

        state.claimed.remove(&id);
        state.servers.insert(
            id.clone(),
            ServerEntry {
                id,
                endpoint,
                stream: stream.clone(),
            },
        );

        Ok(stream)
    }

    /// Remove a server, returning its entry
    ///
    /// Consumers still holding subscriptions keep the link alive until they
    /// drop them.
    pub fn unregister(&self, id: &str) -> RegistryResult<ServerEntry> {
        let entry = self
            .state
            .lock()
            .servers
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        info!(server = %id, "Server unregistered");
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Option<ServerEntry> {
        self.state.lock().servers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.lock().servers.contains_key(id)
    }

    pub fn contains_endpoint(&self, endpoint: &Endpoint) -> bool {
        self.state.lock().owner_of(endpoint).is_some()
    }

    /// Snapshot of all registered servers
    pub fn servers(&self) -> Vec<ServerEntry> {
        self.state.lock().servers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().servers.is_empty()
    }

    /// Claim a discovered server for reporting
    ///
    /// Returns `true` exactly once per identity, and only while neither the
    /// identity nor the endpoint is registered. The check and the claim happen
    /// under the same lock, so concurrent scans cannot both report the same
    /// server.
    pub fn claim_discovery(&self, id: &str, endpoint: &Endpoint) -> bool {
        let mut state = self.state.lock();

        if state.servers.contains_key(id) || state.owner_of(endpoint).is_some() {
            debug!(server = %id, "Discovered server already registered");
            return false;
        }

        state.claimed.insert(id.to_string())
    }

    /// Forget every discovery claim so servers can be reported again
    pub fn release_claims(&self) {
        self.state.lock().claimed.clear();
    }

    /// Remove every server and claim, returning how many servers were removed
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            state.claimed.clear();
            std::mem::take(&mut state.servers)
        };

        debug!("Registry cleared, {} servers removed", removed.len());
        removed.len()
    }
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("servers", &self.len())
            .finish()
    }
}
