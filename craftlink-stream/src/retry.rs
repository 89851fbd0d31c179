//! Retry and reconnect policy
//!
//! A durable link represents an endpoint as a long-lived resource rather than
//! a single TCP session. Its worker loops forever:
//!
//! - connect; on success publish [`LinkState::Online`] before any record of
//!   that attempt is dispatched
//! - when the server closes the socket cleanly, reconnect immediately
//! - when connecting, reading or decoding fails, publish
//!   [`LinkState::Offline`], wait the fixed retry delay, then try again
//!
//! Errors never end the link. Subscribers only ever observe state changes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::connection::{Connection, LinkState};
use crate::connector::{Connector, RecordStream};
use crate::endpoint::Endpoint;
use crate::error::Result;

/// A running retry worker for one endpoint
///
/// Dropping the link aborts the worker, which closes the open socket.
pub struct DurableLink {
    endpoint: Endpoint,
    link: watch::Receiver<LinkState>,
    task: JoinHandle<()>,
}

impl DurableLink {
    /// Spawn a retry worker on the given runtime
    pub fn spawn(
        runtime: &Handle,
        endpoint: Endpoint,
        connector: Arc<dyn Connector>,
        retry_delay: Duration,
    ) -> Self {
        let (link_tx, link) = watch::channel(LinkState::Connecting);

        let task = runtime.spawn(run_durable(
            endpoint.clone(),
            connector,
            retry_delay,
            link_tx,
        ));

        Self {
            endpoint,
            link,
            task,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get a receiver for link state changes
    pub fn receiver(&self) -> watch::Receiver<LinkState> {
        self.link.clone()
    }

    /// Current state of the link
    pub fn state(&self) -> LinkState {
        self.link.borrow().clone()
    }

    /// Whether the worker has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for DurableLink {
    fn drop(&mut self) {
        debug!(endpoint = %self.endpoint, "Stopping durable link");
        self.task.abort();
    }
}

/// Main retry loop for one endpoint
async fn run_durable(
    endpoint: Endpoint,
    connector: Arc<dyn Connector>,
    retry_delay: Duration,
    link: watch::Sender<LinkState>,
) {
    loop {
        debug!(endpoint = %endpoint, "Connecting");

        let outcome = match connector.connect(&endpoint).await {
            Ok(records) => {
                let connection = Connection::new(endpoint.clone());
                info!(endpoint = %endpoint, connection_id = connection.id(), "Server online");
                link.send_replace(LinkState::Online(connection.clone()));
                drive(&connection, records).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                debug!(endpoint = %endpoint, "Server closed the connection, reconnecting");
            }
            Err(e) => {
                warn!(
                    endpoint = %endpoint,
                    error = %e,
                    retry_in = ?retry_delay,
                    "Server offline, retrying"
                );
                link.send_replace(LinkState::Offline {
                    reason: e.to_string(),
                });
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Demultiplex records into the connection's sub-streams until the stream ends
async fn drive(connection: &Connection, mut records: RecordStream) -> Result<()> {
    while let Some(record) = records.next().await {
        let record = record?;
        let kind = record.kind();
        if connection.dispatch(record) {
            trace!(connection_id = connection.id(), %kind, "Record dispatched");
        }
    }
    Ok(())
}
