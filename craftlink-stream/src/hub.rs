//! Shared subscription hub
//!
//! A [`SharedServerStream`] multicasts one durable link to any number of
//! subscribers, in the manner of a `replay(1).refCount()` observable:
//!
//! 1. the retry worker starts lazily on the first subscription
//! 2. late subscribers immediately see the latest link state
//! 3. the worker is aborted (closing the socket) when the subscriber count
//!    drops from 1 to 0, and a later subscription starts a fresh worker
//!
//! Consumers reach records through typed [`Follow`]ers that re-attach to each
//! new connection the link produces.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use craftlink_protocol::{Player, ServerStatus, Sign};

use crate::config::StreamConfig;
use crate::connection::{Connection, LinkState};
use crate::connector::Connector;
use crate::endpoint::Endpoint;
use crate::error::{Result, StreamError};
use crate::retry::DurableLink;
use crate::topic::TopicReceiver;

/// One endpoint's durable link, shared by reference counting
#[derive(Clone)]
pub struct SharedServerStream {
    inner: Arc<HubInner>,
}

struct HubInner {
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    retry_delay: Duration,
    runtime: Handle,
    state: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    subscribers: usize,
    link: Option<DurableLink>,
    activations: u64,
}

impl SharedServerStream {
    /// Create a hub for `endpoint`
    ///
    /// Must be called from within a tokio runtime; workers are spawned on it.
    pub fn new(
        endpoint: Endpoint,
        connector: Arc<dyn Connector>,
        config: &StreamConfig,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| StreamError::NoRuntime)?;

        Ok(Self {
            inner: Arc::new(HubInner {
                endpoint,
                connector,
                retry_delay: config.retry_delay,
                runtime,
                state: Mutex::new(HubState::default()),
            }),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Attach a subscriber, starting the link if this is the first one
    pub fn subscribe(&self) -> Subscription {
        let mut link = {
            let mut state = self.inner.state.lock();
            state.subscribers += 1;

            tracing::debug!(
                "Subscriber count for {}: {} -> {}",
                self.inner.endpoint,
                state.subscribers - 1,
                state.subscribers
            );

            match &state.link {
                Some(link) => link.receiver(),
                None => {
                    state.activations += 1;
                    debug!(
                        endpoint = %self.inner.endpoint,
                        activation = state.activations,
                        "Starting shared link"
                    );
                    let link = DurableLink::spawn(
                        &self.inner.runtime,
                        self.inner.endpoint.clone(),
                        Arc::clone(&self.inner.connector),
                        self.inner.retry_delay,
                    );
                    let receiver = link.receiver();
                    state.link = Some(link);
                    receiver
                }
            }
        };

        // replay the current state to the new subscriber
        link.mark_changed();

        Subscription {
            guard: Arc::new(SubscriptionGuard {
                hub: Arc::clone(&self.inner),
            }),
            link,
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers
    }

    /// Whether a retry worker is currently running for this hub
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().link.is_some()
    }

    /// How many times a fresh worker has been started
    pub fn activations(&self) -> u64 {
        self.inner.state.lock().activations
    }

    /// Current link state, without subscribing
    pub fn link_state(&self) -> Option<LinkState> {
        self.inner.state.lock().link.as_ref().map(DurableLink::state)
    }
}

impl std::fmt::Debug for SharedServerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("SharedServerStream")
            .field("endpoint", &self.inner.endpoint)
            .field("subscribers", &state.subscribers)
            .field("active", &state.link.is_some())
            .finish()
    }
}

impl HubInner {
    fn release(&self) {
        let stopped = {
            let mut state = self.state.lock();
            let old_count = state.subscribers;
            state.subscribers = state.subscribers.saturating_sub(1);

            tracing::debug!(
                "Subscriber count for {}: {} -> {}",
                self.endpoint,
                old_count,
                state.subscribers
            );

            if state.subscribers == 0 {
                state.link.take()
            } else {
                None
            }
        };

        // abort outside the lock
        drop(stopped);
    }
}

/// Decrements the hub's subscriber count when the last handle goes away
struct SubscriptionGuard {
    hub: Arc<HubInner>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.hub.release();
    }
}

/// A subscriber's handle on a shared link
///
/// Clones and followers derived from a subscription share its slot in the
/// hub's count; the slot is released when the last of them is dropped.
#[derive(Clone)]
pub struct Subscription {
    guard: Arc<SubscriptionGuard>,
    link: watch::Receiver<LinkState>,
}

impl Subscription {
    pub fn endpoint(&self) -> &Endpoint {
        &self.guard.hub.endpoint
    }

    /// Current link state
    pub fn link_state(&self) -> LinkState {
        self.link.borrow().clone()
    }

    /// Live connection, if the link is online
    pub fn connection(&self) -> Option<Connection> {
        self.link.borrow().connection().cloned()
    }

    /// Wait for the next link state
    ///
    /// The first call returns the state current at subscription time without
    /// waiting. Returns `None` once the link has stopped.
    pub async fn next_link_state(&mut self) -> Option<LinkState> {
        self.link.changed().await.ok()?;
        let state = self.link.borrow_and_update().clone();
        Some(state)
    }

    /// Follow server status records across reconnections
    pub fn server_status(&self) -> Follow<ServerStatus> {
        self.follow(Connection::server_status)
    }

    /// Follow player list snapshots across reconnections
    pub fn players(&self) -> Follow<Vec<Player>> {
        self.follow(Connection::players)
    }

    /// Follow sign list snapshots across reconnections
    pub fn signs(&self) -> Follow<Vec<Sign>> {
        self.follow(Connection::signs)
    }

    fn follow<T: Clone>(&self, select: fn(&Connection) -> TopicReceiver<T>) -> Follow<T> {
        let mut link = self.link.clone();
        link.mark_changed();

        Follow {
            _guard: Arc::clone(&self.guard),
            link,
            select,
            topic: None,
        }
    }
}

/// One sub-stream of a shared link, followed across reconnections
///
/// Attaches to the sub-stream of each new [`Connection`] and detaches while
/// the link is offline.
pub struct Follow<T> {
    _guard: Arc<SubscriptionGuard>,
    link: watch::Receiver<LinkState>,
    select: fn(&Connection) -> TopicReceiver<T>,
    topic: Option<(u64, TopicReceiver<T>)>,
}

enum Step<T> {
    Value(T),
    TopicClosed,
    LinkChanged,
    LinkClosed,
}

impl<T: Clone + Send + Sync + 'static> Follow<T> {
    /// Wait for the next value
    ///
    /// Returns `None` once the link has stopped.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            self.attach();

            let step = match self.topic.as_mut() {
                Some((_, topic)) => {
                    tokio::select! {
                        value = topic.recv() => match value {
                            Some(value) => Step::Value(value),
                            None => Step::TopicClosed,
                        },
                        changed = self.link.changed() => match changed {
                            Ok(()) => Step::LinkChanged,
                            Err(_) => Step::LinkClosed,
                        },
                    }
                }
                None => match self.link.changed().await {
                    Ok(()) => Step::LinkChanged,
                    Err(_) => Step::LinkClosed,
                },
            };

            match step {
                Step::Value(value) => return Some(value),
                Step::LinkChanged => continue,
                Step::LinkClosed => return None,
                Step::TopicClosed => {
                    self.topic = None;
                    self.link.changed().await.ok()?;
                }
            }
        }
    }

    /// Convert into a stream of values
    pub fn into_stream(self) -> BoxStream<'static, T> {
        stream::unfold(self, |mut follow| async move {
            let value = follow.next().await?;
            Some((value, follow))
        })
        .boxed()
    }

    fn attach(&mut self) {
        let connection = self.link.borrow_and_update().connection().cloned();

        match connection {
            Some(connection) => {
                let attached = self.topic.as_ref().map(|(id, _)| *id);
                if attached != Some(connection.id()) {
                    self.topic = Some((connection.id(), (self.select)(&connection)));
                }
            }
            None => self.topic = None,
        }
    }
}
