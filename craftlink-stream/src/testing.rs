//! In-memory connector and record builders for tests
//!
//! Enabled with the `test-support` feature. Nothing here opens a socket: every
//! successful connect hands out a channel whose sending half the test drives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::time::Instant;

use craftlink_protocol::{Location, Player, Record, Sign};

use crate::connector::{Connector, RecordStream};
use crate::endpoint::Endpoint;
use crate::error::{Result, StreamError};

type SocketSender = mpsc::UnboundedSender<Result<Record>>;

/// A connector whose outcomes are scripted by the test
///
/// Dropping a record stream counts as closing its socket.
pub struct MockConnector {
    failures_left: AtomicUsize,
    initial_records: Mutex<Vec<Record>>,
    opens: AtomicUsize,
    closes: Arc<AtomicUsize>,
    attempts: Mutex<Vec<Instant>>,
    sockets: Mutex<Vec<(Endpoint, SocketSender)>>,
}

impl MockConnector {
    /// Every attempt succeeds
    pub fn new() -> Arc<Self> {
        Self::failing_times(0)
    }

    /// The first `n` attempts fail, later ones succeed
    pub fn failing_times(n: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicUsize::new(n),
            initial_records: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            attempts: Mutex::new(Vec::new()),
            sockets: Mutex::new(Vec::new()),
        })
    }

    /// Every attempt is refused
    pub fn always_failing() -> Arc<Self> {
        Self::failing_times(usize::MAX)
    }

    /// Records every new socket delivers right after opening
    pub fn with_initial_records(self: Arc<Self>, records: Vec<Record>) -> Arc<Self> {
        *self.initial_records.lock() = records;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    /// Sockets whose reading side is still alive
    pub fn live_sockets(&self) -> usize {
        self.sockets
            .lock()
            .iter()
            .filter(|(_, socket)| !socket.is_closed())
            .count()
    }

    /// Deliver a record on the newest socket
    pub fn send(&self, record: Record) -> bool {
        match self.sockets.lock().last() {
            Some((_, socket)) => socket.unbounded_send(Ok(record)).is_ok(),
            None => false,
        }
    }

    /// Deliver a record on the newest socket opened to `endpoint`
    pub fn send_to(&self, endpoint: &Endpoint, record: Record) -> bool {
        self.sockets
            .lock()
            .iter()
            .rev()
            .find(|(open, _)| open == endpoint)
            .map(|(_, socket)| socket.unbounded_send(Ok(record)).is_ok())
            .unwrap_or(false)
    }

    /// Close the newest socket from the server side
    pub fn close_latest(&self) {
        self.sockets.lock().pop();
    }

    /// Fail the newest socket with `error`
    pub fn fail_latest(&self, error: StreamError) {
        if let Some((_, socket)) = self.sockets.lock().pop() {
            socket.unbounded_send(Err(error)).ok();
        }
    }
}

struct CloseCounter(Arc<AtomicUsize>);

impl Drop for CloseCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<RecordStream> {
        self.attempts.lock().push(Instant::now());

        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();

        if refused {
            return Err(StreamError::Connect {
                endpoint: endpoint.clone(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            });
        }

        let (tx, rx) = mpsc::unbounded();
        for record in self.initial_records.lock().iter().cloned() {
            tx.unbounded_send(Ok(record)).ok();
        }
        self.sockets.lock().push((endpoint.clone(), tx));
        self.opens.fetch_add(1, Ordering::SeqCst);

        let guard = CloseCounter(Arc::clone(&self.closes));
        Ok(rx
            .map(move |record| {
                let _socket = &guard;
                record
            })
            .boxed())
    }
}

/// The endpoint tests connect to unless they need several
pub fn endpoint() -> Endpoint {
    Endpoint::new("10.0.0.5", 10692)
}

pub fn player(name: &str) -> Player {
    Player {
        name: name.to_string(),
        display_name: name.to_string(),
        level: 1,
        experience: 0.0,
        total_experience: 0,
        health: 20.0,
        walk_speed: 0.2,
        location: Location::default(),
    }
}

pub fn players(names: &[&str]) -> Record {
    Record::Players(names.iter().map(|name| player(name)).collect())
}

pub fn sign(name: &str) -> Sign {
    Sign {
        name: name.to_string(),
        powered: true,
        text: vec![name.to_string()],
        location: None,
    }
}

pub fn signs(names: &[&str]) -> Record {
    Record::Signs(names.iter().map(|name| sign(name)).collect())
}

pub fn names(players: &[Player]) -> Vec<String> {
    players.iter().map(|p| p.name.clone()).collect()
}

/// Poll `condition` until it holds
///
/// # Panics
///
/// When the condition does not hold within five seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    if reached.is_err() {
        panic!("condition not reached in time");
    }
}
