use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use craftlink_discovery::{ThingType, ThingUid};
use craftlink_stream::{Endpoint, LinkState, ServerRegistry, Subscription};

use super::spawn;
use crate::channel::{
    server_channels, ChannelSink, ChannelState, StatusDetail, ThingStatus, CHANNEL_ONLINE,
};
use crate::config::ServerConfig;
use crate::error::{BindingError, Result};

/// Owns a server's registry entry and publishes its channels
///
/// The handler holds one subscription on the server's shared stream for as
/// long as it lives, so the connection stays up while the thing exists.
pub struct ServerHandler {
    uid: ThingUid,
    endpoint: Endpoint,
    registry: Arc<ServerRegistry>,
    task: JoinHandle<()>,
}

impl ServerHandler {
    /// Register the server and start publishing its state
    pub fn start(
        uid: ThingUid,
        config: &ServerConfig,
        registry: Arc<ServerRegistry>,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<Self> {
        if uid.thing_type() != ThingType::Server {
            return Err(BindingError::Configuration(format!("{uid} is not a server")));
        }
        config.validate()?;

        let endpoint = Endpoint::new(config.hostname.trim(), config.port);
        let stream = registry.register(uid.to_string(), endpoint.clone())?;

        let task = match spawn(run_server(uid.clone(), stream.subscribe(), sink)) {
            Ok(task) => task,
            Err(e) => {
                if let Err(unregister) = registry.unregister(&uid.to_string()) {
                    debug!(thing = %uid, error = %unregister, "Server was already unregistered");
                }
                return Err(e);
            }
        };

        info!(thing = %uid, endpoint = %endpoint, "Initializing server handler");

        Ok(Self {
            uid,
            endpoint,
            registry,
            task,
        })
    }

    pub fn uid(&self) -> &ThingUid {
        &self.uid
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Stop publishing and remove the server from the registry
    ///
    /// Children following this server keep its stream alive until they are
    /// disposed themselves.
    pub fn dispose(self) {
        info!(thing = %self.uid, "Disposing server handler");
        if self.registry.unregister(&self.uid.to_string()).is_err() {
            debug!(thing = %self.uid, "Server was already unregistered");
        }
    }
}

impl Drop for ServerHandler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_server(uid: ThingUid, mut subscription: Subscription, sink: Arc<dyn ChannelSink>) {
    let mut status = subscription.server_status();
    let mut online: Option<bool> = None;

    loop {
        tokio::select! {
            state = subscription.next_link_state() => {
                let now_online = match state {
                    Some(LinkState::Online(_)) => true,
                    Some(LinkState::Offline { .. }) => false,
                    Some(LinkState::Connecting) => continue,
                    None => break,
                };

                if online == Some(now_online) {
                    continue;
                }
                online = Some(now_online);

                sink.update_state(&uid, CHANNEL_ONLINE, ChannelState::OnOff(now_online));
                sink.update_status(
                    &uid,
                    if now_online {
                        ThingStatus::Online
                    } else {
                        ThingStatus::Offline(StatusDetail::CommunicationError)
                    },
                );
            }
            Some(record) = status.next() => {
                for (channel, state) in server_channels(&record) {
                    sink.update_state(&uid, channel, state);
                }
            }
            else => break,
        }
    }

    debug!(thing = %uid, "Server stream ended");
}
