//! Telemetry records published by a game server
//!
//! Every list-carrying record is a complete snapshot. A new [`Record::Players`]
//! replaces the previous player set wholesale; there are no partial updates.

use serde::{Deserialize, Serialize};

/// Server-wide status, superseded by the next status record.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Server name as announced by the server itself
    pub name: String,

    /// Number of players currently connected
    pub players: u32,

    /// Player capacity
    pub max_players: u32,

    /// Game version string
    pub version: String,

    /// Server software (Bukkit) version string
    pub bukkit_version: String,
}

/// Block coordinates in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A connected player.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Account name, unique per server
    pub name: String,

    /// Name shown in game (may carry formatting)
    pub display_name: String,

    /// Experience level
    pub level: u32,

    /// Progress towards the next level, between 0 and 1
    pub experience: f64,

    /// Experience collected in total
    pub total_experience: u32,

    pub health: f64,

    pub walk_speed: f64,

    pub location: Location,
}

impl Player {
    /// Check whether this player carries the given account name
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }
}

/// A named sign placed in the world.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sign {
    /// Sign name, unique per server
    pub name: String,

    /// Whether the sign is powered by redstone
    #[serde(default)]
    pub powered: bool,

    /// Text lines written on the sign
    #[serde(default)]
    pub text: Vec<String>,

    #[serde(default)]
    pub location: Option<Location>,
}

impl Sign {
    /// Check whether this sign carries the given name
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }
}

/// A decoded record, tagged by kind.
///
/// On the wire the tag is carried in `type` and the payload in `data`:
///
/// ```json
/// {"type": "server", "data": {"name": "lobby", "players": 1, ...}}
/// {"type": "players", "data": [{"name": "Alice", ...}]}
/// {"type": "signs", "data": []}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum Record {
    #[serde(rename = "server")]
    Status(ServerStatus),

    #[serde(rename = "players")]
    Players(Vec<Player>),

    #[serde(rename = "signs")]
    Signs(Vec<Sign>),
}

/// The kind tag a [`Record`] is routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Status,
    Players,
    Signs,
}

impl Record {
    /// Get the kind tag of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Status(_) => RecordKind::Status,
            Record::Players(_) => RecordKind::Players,
            Record::Signs(_) => RecordKind::Signs,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Status => write!(f, "server"),
            RecordKind::Players => write!(f, "players"),
            RecordKind::Signs => write!(f, "signs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> Player {
        Player {
            name: name.to_string(),
            display_name: name.to_string(),
            level: 3,
            experience: 0.25,
            total_experience: 40,
            health: 20.0,
            walk_speed: 0.2,
            location: Location::default(),
        }
    }

    #[test]
    fn test_record_kind() {
        assert_eq!(Record::Players(vec![]).kind(), RecordKind::Players);
        assert_eq!(Record::Signs(vec![]).kind(), RecordKind::Signs);
        assert_eq!(RecordKind::Status.to_string(), "server");
    }

    #[test]
    fn test_player_is_named() {
        let alice = player("Alice");
        assert!(alice.is_named("Alice"));
        assert!(!alice.is_named("alice"));
    }

    #[test]
    fn test_player_serializes_camel_case() {
        let json = serde_json::to_string(&player("Alice")).unwrap();
        assert!(json.contains("\"displayName\""));
        assert!(json.contains("\"totalExperience\""));
        assert!(json.contains("\"walkSpeed\""));
    }

    #[test]
    fn test_sign_defaults() {
        let sign: Sign = serde_json::from_str(r#"{"name":"door"}"#).unwrap();
        assert_eq!(sign.name, "door");
        assert!(!sign.powered);
        assert!(sign.text.is_empty());
        assert!(sign.location.is_none());
    }
}
