//! Channels, thing status and the sink they are published to
//!
//! Each thing exposes typed channels. Handlers translate records into
//! [`ChannelState`] updates; rendering them is up to the [`ChannelSink`].

use tokio::sync::mpsc;
use tracing::debug;

use craftlink_discovery::ThingUid;
use craftlink_protocol::{Player, ServerStatus, Sign};

// Server channels
pub const CHANNEL_ONLINE: &str = "online";
pub const CHANNEL_NAME: &str = "name";
pub const CHANNEL_PLAYERS: &str = "players";
pub const CHANNEL_MAX_PLAYERS: &str = "maxPlayers";
pub const CHANNEL_VERSION: &str = "version";
pub const CHANNEL_BUKKIT_VERSION: &str = "bukkitVersion";

// Player channels
pub const CHANNEL_PLAYER_ONLINE: &str = "playerOnline";
pub const CHANNEL_PLAYER_NAME: &str = "playerName";
pub const CHANNEL_PLAYER_LEVEL: &str = "playerLevel";
pub const CHANNEL_PLAYER_LEVEL_PERCENTAGE: &str = "playerLevelPercentage";
pub const CHANNEL_PLAYER_TOTAL_EXPERIENCE: &str = "playerTotalExperience";
pub const CHANNEL_PLAYER_HEALTH: &str = "playerHealth";
pub const CHANNEL_PLAYER_WALK_SPEED: &str = "playerWalkSpeed";
pub const CHANNEL_PLAYER_LOCATION_X: &str = "playerLocationX";
pub const CHANNEL_PLAYER_LOCATION_Y: &str = "playerLocationY";
pub const CHANNEL_PLAYER_LOCATION_Z: &str = "playerLocationZ";

// Sign channels
pub const CHANNEL_SIGN_ACTIVATED: &str = "signActivated";
pub const CHANNEL_SIGN_TEXT: &str = "signText";

/// Value of a channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelState {
    OnOff(bool),
    Decimal(f64),
    Text(String),
}

/// Why a thing is offline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusDetail {
    /// The server cannot be reached right now; retries continue
    CommunicationError,
    /// The thing cannot work as configured; nothing is retried
    ConfigurationError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThingStatus {
    Online,
    Offline(StatusDetail),
}

/// Receiver of channel and status updates
pub trait ChannelSink: Send + Sync + 'static {
    fn update_state(&self, thing: &ThingUid, channel: &str, state: ChannelState);

    fn update_status(&self, thing: &ThingUid, status: ThingStatus);
}

/// One update sent through a channel-backed sink
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelUpdate {
    State {
        thing: ThingUid,
        channel: String,
        state: ChannelState,
    },
    Status {
        thing: ThingUid,
        status: ThingStatus,
    },
}

impl ChannelSink for mpsc::UnboundedSender<ChannelUpdate> {
    fn update_state(&self, thing: &ThingUid, channel: &str, state: ChannelState) {
        if self
            .send(ChannelUpdate::State {
                thing: thing.clone(),
                channel: channel.to_string(),
                state,
            })
            .is_err()
        {
            debug!(thing = %thing, channel, "Channel sink closed, state dropped");
        }
    }

    fn update_status(&self, thing: &ThingUid, status: ThingStatus) {
        if self
            .send(ChannelUpdate::Status {
                thing: thing.clone(),
                status,
            })
            .is_err()
        {
            debug!(thing = %thing, "Channel sink closed, status dropped");
        }
    }
}

pub(crate) type ChannelValues = Vec<(&'static str, ChannelState)>;

pub(crate) fn server_channels(status: &ServerStatus) -> ChannelValues {
    vec![
        (CHANNEL_NAME, ChannelState::Text(status.name.clone())),
        (CHANNEL_PLAYERS, ChannelState::Decimal(f64::from(status.players))),
        (CHANNEL_MAX_PLAYERS, ChannelState::Decimal(f64::from(status.max_players))),
        (CHANNEL_VERSION, ChannelState::Text(status.version.clone())),
        (CHANNEL_BUKKIT_VERSION, ChannelState::Text(status.bukkit_version.clone())),
    ]
}

pub(crate) fn player_channels(player: Option<&Player>) -> ChannelValues {
    let Some(player) = player else {
        return vec![(CHANNEL_PLAYER_ONLINE, ChannelState::OnOff(false))];
    };

    vec![
        (CHANNEL_PLAYER_ONLINE, ChannelState::OnOff(true)),
        (CHANNEL_PLAYER_NAME, ChannelState::Text(player.display_name.clone())),
        (CHANNEL_PLAYER_LEVEL, ChannelState::Decimal(f64::from(player.level))),
        (CHANNEL_PLAYER_LEVEL_PERCENTAGE, ChannelState::Decimal(player.experience)),
        (
            CHANNEL_PLAYER_TOTAL_EXPERIENCE,
            ChannelState::Decimal(f64::from(player.total_experience)),
        ),
        (CHANNEL_PLAYER_HEALTH, ChannelState::Decimal(player.health)),
        (CHANNEL_PLAYER_WALK_SPEED, ChannelState::Decimal(player.walk_speed)),
        (CHANNEL_PLAYER_LOCATION_X, ChannelState::Decimal(player.location.x)),
        (CHANNEL_PLAYER_LOCATION_Y, ChannelState::Decimal(player.location.y)),
        (CHANNEL_PLAYER_LOCATION_Z, ChannelState::Decimal(player.location.z)),
    ]
}

pub(crate) fn sign_channels(sign: Option<&Sign>) -> ChannelValues {
    let Some(sign) = sign else {
        return vec![(CHANNEL_SIGN_ACTIVATED, ChannelState::OnOff(false))];
    };

    vec![
        (CHANNEL_SIGN_ACTIVATED, ChannelState::OnOff(sign.powered)),
        (CHANNEL_SIGN_TEXT, ChannelState::Text(sign.text.join("\n"))),
    ]
}
