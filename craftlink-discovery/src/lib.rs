//! Discovery of game servers and of the players and signs they host
//!
//! Servers are found through local-network service advertisements; players
//! and signs are found by following the live streams of servers that are
//! already registered.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use craftlink_discovery::{ChannelDiscoverySource, DiscoveryConfig, DiscoveryService};
//! use craftlink_stream::{ServerRegistry, StreamConfig, TcpConnector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::default();
//! let registry = Arc::new(ServerRegistry::new(Arc::new(TcpConnector::new(&config)), config)?);
//! let (tx, mut results) = tokio::sync::mpsc::unbounded_channel();
//!
//! let discovery = DiscoveryService::new(
//!     registry,
//!     Arc::new(ChannelDiscoverySource::new()),
//!     Arc::new(tx),
//!     DiscoveryConfig::default(),
//! )?;
//!
//! discovery.start_default_scan().await?;
//! while let Some(result) = results.recv().await {
//!     println!("Found {} ({})", result.label, result.uid);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod ids;
mod result;
mod service;
mod source;

pub use config::{DiscoveryConfig, DEFAULT_SERVICE_NAME};
pub use error::{DiscoveryError, Result};
pub use ids::{ThingType, ThingUid, BINDING_ID};
pub use result::{
    DiscoveryResult, DiscoverySink, PROPERTY_HOSTNAME, PROPERTY_PLAYER_NAME, PROPERTY_PORT,
    PROPERTY_SIGN_NAME,
};
pub use service::DiscoveryService;
pub use source::{ChannelDiscoverySource, DiscoverySource, ServiceEvent, ServiceEventStream};
