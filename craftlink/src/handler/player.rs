use std::sync::Arc;

use craftlink_discovery::ThingUid;
use craftlink_stream::{Player, ServerEntry, ServerRegistry};

use super::ChildHandler;
use crate::channel::{player_channels, ChannelSink};
use crate::config::PlayerConfig;
use crate::error::Result;

/// Publishes one player's channels from its bridge server's player list
///
/// `playerOnline` is updated on every snapshot; the remaining channels only
/// while the player is present.
pub struct PlayerHandler {
    core: ChildHandler,
}

impl PlayerHandler {
    pub fn start(
        uid: ThingUid,
        bridge: Option<&ThingUid>,
        config: &PlayerConfig,
        registry: &ServerRegistry,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<Self> {
        let core = ChildHandler::start(
            uid,
            bridge,
            &config.name,
            registry,
            sink,
            |entry: &ServerEntry| entry.stream.subscribe().players(),
            |players: &[Player], name: &str| {
                player_channels(players.iter().find(|p| p.is_named(name)))
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

    /// Whether the handler is following its bridge
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    pub fn dispose(self) {}
}
