//! One connection attempt and its demultiplexed sub-streams
//!
//! A [`Connection`] is created by the retry worker each time a socket opens.
//! Records read from that socket are routed by kind into three independent
//! [`Topic`]s: server status, player list and sign list.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use craftlink_protocol::{Player, Record, ServerStatus, Sign};

use crate::endpoint::Endpoint;
use crate::topic::{Topic, TopicReceiver};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one live connection attempt
///
/// Cheap to clone; all clones share the same sub-streams.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: u64,
    endpoint: Endpoint,
    status: Topic<ServerStatus>,
    players: Topic<Vec<Player>>,
    signs: Topic<Vec<Sign>>,
}

impl Connection {
    /// Create a connection handle with empty sub-streams
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                endpoint,
                status: Topic::new(),
                players: Topic::new(),
                signs: Topic::new(),
            }),
        }
    }

    /// Unique id of this attempt
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Route a record to the sub-stream for its kind
    ///
    /// Returns whether the record was emitted; a record equal to the previous
    /// one of its kind is suppressed.
    pub fn dispatch(&self, record: Record) -> bool {
        match record {
            Record::Status(status) => self.inner.status.publish(status),
            Record::Players(players) => self.inner.players.publish(players),
            Record::Signs(signs) => self.inner.signs.publish(signs),
        }
    }

    pub fn server_status(&self) -> TopicReceiver<ServerStatus> {
        self.inner.status.subscribe()
    }

    pub fn players(&self) -> TopicReceiver<Vec<Player>> {
        self.inner.players.subscribe()
    }

    pub fn signs(&self) -> TopicReceiver<Vec<Sign>> {
        self.inner.signs.subscribe()
    }

    pub fn latest_status(&self) -> Option<ServerStatus> {
        self.inner.status.latest()
    }

    pub fn latest_players(&self) -> Option<Vec<Player>> {
        self.inner.players.latest()
    }

    pub fn latest_signs(&self) -> Option<Vec<Sign>> {
        self.inner.signs.latest()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .finish()
    }
}

/// State of a durable link to one endpoint, as seen by subscribers
#[derive(Debug, Clone)]
pub enum LinkState {
    /// No attempt has completed yet
    Connecting,
    /// A socket is open; records flow into this connection's sub-streams
    Online(Connection),
    /// The last attempt failed; the next one starts after the retry delay
    Offline { reason: String },
}

impl LinkState {
    pub fn is_online(&self) -> bool {
        matches!(self, LinkState::Online(_))
    }

    /// Get the live connection, if any
    pub fn connection(&self) -> Option<&Connection> {
        match self {
            LinkState::Online(connection) => Some(connection),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftlink_protocol::Location;

    fn sign(name: &str) -> Sign {
        Sign {
            name: name.to_string(),
            powered: false,
            text: Vec::new(),
            location: Some(Location::default()),
        }
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let endpoint = Endpoint::new("localhost", 25565);
        let first = Connection::new(endpoint.clone());
        let second = Connection::new(endpoint);

        assert_ne!(first.id(), second.id());
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let connection = Connection::new(Endpoint::new("localhost", 25565));

        assert!(connection.dispatch(Record::Signs(vec![sign("gate")])));
        assert!(connection.latest_players().is_none());
        assert!(connection.latest_status().is_none());
        assert_eq!(connection.latest_signs().map(|s| s.len()), Some(1));

        // identical snapshot is suppressed
        assert!(!connection.dispatch(Record::Signs(vec![sign("gate")])));
    }

    #[tokio::test]
    async fn test_slow_sign_consumer_does_not_block_players() {
        let connection = Connection::new(Endpoint::new("localhost", 25565));
        let _stalled_signs = connection.signs();
        let mut players = connection.players();

        for i in 0..100 {
            connection.dispatch(Record::Signs(vec![sign(&format!("sign-{}", i))]));
        }
        connection.dispatch(Record::Players(Vec::new()));

        assert_eq!(players.recv().await, Some(Vec::new()));
    }

    #[test]
    fn test_link_state_accessors() {
        let connection = Connection::new(Endpoint::new("localhost", 25565));

        assert!(LinkState::Online(connection.clone()).is_online());
        assert_eq!(
            LinkState::Online(connection.clone()).connection(),
            Some(&connection)
        );
        assert!(!LinkState::Connecting.is_online());
        assert!(LinkState::Offline {
            reason: "refused".to_string()
        }
        .connection()
        .is_none());
    }
}
