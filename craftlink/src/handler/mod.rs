//! Thing handlers
//!
//! A server handler owns the server's registry entry and keeps one
//! subscription on its shared stream. Player and sign handlers are children:
//! they follow their bridge server's lists and never connect on their own.

mod player;
mod server;
mod sign;

pub use player::PlayerHandler;
pub use server::ServerHandler;
pub use sign::SignHandler;

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use craftlink_discovery::ThingUid;
use craftlink_stream::{Follow, ServerEntry, ServerRegistry, StreamError};

use crate::channel::{ChannelSink, ChannelValues, StatusDetail, ThingStatus};
use crate::error::Result;

fn spawn<F>(future: F) -> Result<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| StreamError::NoRuntime)?;
    Ok(runtime.spawn(future))
}

/// Shared core of player and sign handlers
struct ChildHandler {
    uid: ThingUid,
    bridge: Option<ThingUid>,
    task: Option<JoinHandle<()>>,
}

impl ChildHandler {
    /// Follow the element called `name` in the bridge's lists
    ///
    /// A missing or unknown bridge is reported once as a configuration error
    /// and the handler stays idle.
    fn start<T>(
        uid: ThingUid,
        bridge: Option<&ThingUid>,
        name: &str,
        registry: &ServerRegistry,
        sink: Arc<dyn ChannelSink>,
        follow: fn(&ServerEntry) -> Follow<Vec<T>>,
        channels: fn(&[T], &str) -> ChannelValues,
    ) -> Result<Self>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Some(entry) = resolve_bridge(&uid, bridge, registry, sink.as_ref()) else {
            return Ok(Self {
                uid,
                bridge: bridge.cloned(),
                task: None,
            });
        };

        sink.update_status(&uid, ThingStatus::Online);

        let task = spawn(follow_named(
            uid.clone(),
            name.to_string(),
            follow(&entry),
            sink,
            channels,
        ))?;

        Ok(Self {
            uid,
            bridge: bridge.cloned(),
            task: Some(task),
        })
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ChildHandler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(thing = %self.uid, "Disposing handler");
            task.abort();
        }
    }
}

fn resolve_bridge(
    uid: &ThingUid,
    bridge: Option<&ThingUid>,
    registry: &ServerRegistry,
    sink: &dyn ChannelSink,
) -> Option<ServerEntry> {
    let reason = match bridge {
        None => "No bridge configured".to_string(),
        Some(bridge) => match registry.get(&bridge.to_string()) {
            Some(entry) => return Some(entry),
            None => format!("Bridge {bridge} is not a known server"),
        },
    };

    warn!(thing = %uid, reason = %reason, "Thing misconfigured");
    sink.update_status(
        uid,
        ThingStatus::Offline(StatusDetail::ConfigurationError(reason)),
    );
    None
}

async fn follow_named<T>(
    uid: ThingUid,
    name: String,
    mut follow: Follow<Vec<T>>,
    sink: Arc<dyn ChannelSink>,
    channels: fn(&[T], &str) -> ChannelValues,
) where
    T: Clone + Send + Sync + 'static,
{
    while let Some(items) = follow.next().await {
        for (channel, state) in channels(&items, &name) {
            sink.update_state(&uid, channel, state);
        }
    }

    debug!(thing = %uid, "Bridge stream ended");
}
