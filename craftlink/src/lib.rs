//! # craftlink - game-server things for home automation
//!
//! Connects to game servers running the telemetry plugin and exposes each
//! server, player and sign as a thing with typed channels:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use craftlink::{Binding, BindingConfig, ChannelUpdate, ServerConfig, PlayerConfig};
//! use craftlink::discovery::{ChannelDiscoverySource, DiscoveryResult, ThingType, ThingUid};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), craftlink::BindingError> {
//!     craftlink::logging::init_logging_from_env().ok();
//!
//!     let (channels, mut updates) = tokio::sync::mpsc::unbounded_channel::<ChannelUpdate>();
//!     let (discoveries, _results) = tokio::sync::mpsc::unbounded_channel::<DiscoveryResult>();
//!
//!     let binding = Binding::with_tcp(
//!         BindingConfig::from_env()?,
//!         Arc::new(ChannelDiscoverySource::new()),
//!         Arc::new(channels),
//!         Arc::new(discoveries),
//!     )?;
//!
//!     let server = ThingUid::server_for_host("10.0.0.5");
//!     binding.add_server(server.clone(), &ServerConfig::new("10.0.0.5", 10692))?;
//!
//!     let alice = ThingUid::child(ThingType::Player, &server, "Alice");
//!     binding.add_player(alice, Some(&server), &PlayerConfig::new("Alice"))?;
//!
//!     while let Some(update) = updates.recv().await {
//!         println!("{update:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Binding (things, channels)
//!     ↓
//! craftlink-discovery (scans, fan-outs)
//!     ↓
//! craftlink-stream (shared self-healing connections)
//!     ↓
//! craftlink-protocol (records and decoding)
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;

pub use channel::{ChannelSink, ChannelState, ChannelUpdate, StatusDetail, ThingStatus};
pub use config::{BindingConfig, PlayerConfig, ServerConfig, SignConfig};
pub use error::{BindingError, Result};
pub use handler::{PlayerHandler, ServerHandler, SignHandler};

pub use craftlink_discovery as discovery;
pub use craftlink_protocol as protocol;
pub use craftlink_stream as stream;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use craftlink_discovery::{DiscoveryService, DiscoverySink, DiscoverySource, ThingType, ThingUid};
use craftlink_stream::{Connector, ServerRegistry, TcpConnector};

enum Handler {
    Server(ServerHandler),
    Player(PlayerHandler),
    Sign(SignHandler),
}

impl Handler {
    fn dispose(self) {
        match self {
            Handler::Server(handler) => handler.dispose(),
            Handler::Player(handler) => handler.dispose(),
            Handler::Sign(handler) => handler.dispose(),
        }
    }
}

/// Entry point owning the server registry, discovery and every thing handler
pub struct Binding {
    config: BindingConfig,
    registry: Arc<ServerRegistry>,
    discovery: DiscoveryService,
    channels: Arc<dyn ChannelSink>,
    handlers: Mutex<HashMap<ThingUid, Handler>>,
}

impl Binding {
    pub fn new(
        config: BindingConfig,
        connector: Arc<dyn Connector>,
        source: Arc<dyn DiscoverySource>,
        channels: Arc<dyn ChannelSink>,
        discoveries: Arc<dyn DiscoverySink>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ServerRegistry::new(connector, config.stream.clone())?);
        let discovery = DiscoveryService::new(
            Arc::clone(&registry),
            source,
            discoveries,
            config.discovery.clone(),
        )?;

        Ok(Self {
            config,
            registry,
            discovery,
            channels,
            handlers: Mutex::new(HashMap::new()),
        })
    }

    /// Binding connecting over TCP with the JSON line decoder
    pub fn with_tcp(
        config: BindingConfig,
        source: Arc<dyn DiscoverySource>,
        channels: Arc<dyn ChannelSink>,
        discoveries: Arc<dyn DiscoverySink>,
    ) -> Result<Self> {
        let connector = Arc::new(TcpConnector::new(&config.stream));
        Self::new(config, connector, source, channels, discoveries)
    }

    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    /// Add a server thing and connect to it
    pub fn add_server(&self, uid: ThingUid, config: &ServerConfig) -> Result<()> {
        let mut handlers = self.handlers.lock();
        ensure_new(&handlers, &uid)?;

        let handler = ServerHandler::start(
            uid.clone(),
            config,
            Arc::clone(&self.registry),
            Arc::clone(&self.channels),
        )?;
        handlers.insert(uid, Handler::Server(handler));
        Ok(())
    }

    /// Add a player thing following `bridge`
    ///
    /// Without a usable bridge the player is added but reported offline with
    /// a configuration error.
    pub fn add_player(
        &self,
        uid: ThingUid,
        bridge: Option<&ThingUid>,
        config: &PlayerConfig,
    ) -> Result<()> {
        let mut handlers = self.handlers.lock();
        ensure_new(&handlers, &uid)?;
        ensure_type(&uid, ThingType::Player)?;

        let handler = PlayerHandler::start(
            uid.clone(),
            bridge,
            config,
            &self.registry,
            Arc::clone(&self.channels),
        )?;
        handlers.insert(uid, Handler::Player(handler));
        Ok(())
    }

    /// Add a sign thing following `bridge`
    pub fn add_sign(
        &self,
        uid: ThingUid,
        bridge: Option<&ThingUid>,
        config: &SignConfig,
    ) -> Result<()> {
        let mut handlers = self.handlers.lock();
        ensure_new(&handlers, &uid)?;
        ensure_type(&uid, ThingType::Sign)?;

        let handler = SignHandler::start(
            uid.clone(),
            bridge,
            config,
            &self.registry,
            Arc::clone(&self.channels),
        )?;
        handlers.insert(uid, Handler::Sign(handler));
        Ok(())
    }

    /// Dispose a thing's handler
    pub fn remove(&self, uid: &ThingUid) -> Result<()> {
        let handler = self
            .handlers
            .lock()
            .remove(uid)
            .ok_or_else(|| BindingError::ThingNotFound(uid.to_string()))?;

        handler.dispose();
        debug!(thing = %uid, "Thing removed");
        Ok(())
    }

    /// Things currently handled
    pub fn things(&self) -> Vec<ThingUid> {
        let mut things: Vec<_> = self.handlers.lock().keys().cloned().collect();
        things.sort();
        things
    }

    /// Start a discovery scan with the configured timeout
    pub async fn start_scan(&self) -> Result<()> {
        self.discovery.start_default_scan().await?;
        Ok(())
    }

    pub async fn stop_scan(&self) {
        self.discovery.stop_scan().await;
    }

    /// Stop discovery, dispose every handler and clear the registry
    pub async fn shutdown(&self) {
        self.discovery.stop_scan().await;

        let handlers: Vec<_> = self.handlers.lock().drain().collect();
        let count = handlers.len();

        // children first, so servers are unregistered last
        let (servers, children): (Vec<_>, Vec<_>) = handlers
            .into_iter()
            .partition(|(_, handler)| matches!(handler, Handler::Server(_)));
        for (_, handler) in children.into_iter().chain(servers) {
            handler.dispose();
        }

        let cleared = self.registry.clear();
        info!(things = count, servers = cleared, "Binding shut down");
    }
}

fn ensure_new(handlers: &HashMap<ThingUid, Handler>, uid: &ThingUid) -> Result<()> {
    if handlers.contains_key(uid) {
        return Err(BindingError::ThingExists(uid.to_string()));
    }
    Ok(())
}

fn ensure_type(uid: &ThingUid, expected: ThingType) -> Result<()> {
    if uid.thing_type() != expected {
        return Err(BindingError::Configuration(format!("{uid} is not a {expected}")));
    }
    Ok(())
}
