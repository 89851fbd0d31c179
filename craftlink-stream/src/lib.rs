//! # craftlink-stream
//!
//! Resilient, shared connections to game-server telemetry sockets.
//!
//! ## Overview
//!
//! Data flows in one direction through named stages:
//!
//! ```text
//! socket bytes ─▶ RecordDecoder ─▶ Connection (demux) ─▶ DurableLink (retry)
//!                                                            │
//!                                       SharedServerStream (ref-counted, replay 1)
//!                                         │            │            │
//!                                     Follow<Status> Follow<Players> Follow<Signs> ...
//! ```
//!
//! - **Connection**: one socket; records are routed by kind into three
//!   independent latest-value topics with duplicate suppression
//! - **DurableLink**: infinite retry with a fixed delay on failure, immediate
//!   reconnect on a clean close, `Online` always before records
//! - **SharedServerStream**: one worker per endpoint no matter how many
//!   subscribers; torn down when the last one leaves, fresh on the next
//! - **ServerRegistry**: explicit endpoint → stream registry shared with
//!   discovery
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use craftlink_stream::{Endpoint, ServerRegistry, StreamConfig, TcpConnector};
//!
//! let config = StreamConfig::default();
//! let registry = ServerRegistry::new(Arc::new(TcpConnector::new(&config)), config)?;
//! let stream = registry.register("minecraft:server:lobby", Endpoint::new("10.0.0.5", 10692))?;
//!
//! let subscription = stream.subscribe();
//! let mut players = subscription.players();
//! while let Some(players) = players.next().await {
//!     println!("{} players online", players.len());
//! }
//! ```

pub mod config;
pub mod connection;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod hub;
pub mod registry;
pub mod retry;
pub mod topic;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::StreamConfig;
pub use connection::{Connection, LinkState};
pub use connector::{Connector, RecordStream, TcpConnector};
pub use endpoint::Endpoint;
pub use error::{RegistryError, RegistryResult, Result, StreamError};
pub use hub::{Follow, SharedServerStream, Subscription};
pub use registry::{ServerEntry, ServerRegistry};
pub use retry::DurableLink;
pub use topic::{Topic, TopicReceiver};

// Re-export record types so consumers need a single dependency
pub use craftlink_protocol::{Location, Player, Record, RecordKind, ServerStatus, Sign};
