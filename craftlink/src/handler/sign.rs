use std::sync::Arc;

use craftlink_discovery::ThingUid;
use craftlink_stream::{ServerEntry, ServerRegistry, Sign};

use super::ChildHandler;
use crate::channel::{sign_channels, ChannelSink};
use crate::config::SignConfig;
use crate::error::Result;

/// Publishes one sign's channels from its bridge server's sign list
pub struct SignHandler {
    core: ChildHandler,
}

impl SignHandler {
    pub fn start(
        uid: ThingUid,
        bridge: Option<&ThingUid>,
        config: &SignConfig,
        registry: &ServerRegistry,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<Self> {
        let core = ChildHandler::start(
            uid,
            bridge,
            &config.name,
            registry,
            sink,
            |entry: &ServerEntry| entry.stream.subscribe().signs(),
            |signs: &[Sign], name: &str| {
                sign_channels(signs.iter().find(|s| s.is_named(name)))
            },
        )?;

        Ok(Self { core })
    }

    pub fn uid(&self) -> &ThingUid {
        &self.core.uid
    }

    pub fn bridge(&self) -> Option<&ThingUid> {
        self.core.bridge.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn dispose(self) {}
}
