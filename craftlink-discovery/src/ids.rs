//! Thing identifiers
//!
//! Every server, player and sign is addressed by a [`ThingUid`] of the form
//! `minecraft:<type>:<id>`. The identifier namespace reserves `.` and `:`, so
//! ids are restricted to `[A-Za-z0-9_-]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DiscoveryError, Result};

/// Binding prefix shared by every thing uid
pub const BINDING_ID: &str = "minecraft";

/// Hex digits kept from the child hash
const CHILD_ID_LEN: usize = 16;

/// Kinds of things the binding knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThingType {
    Server,
    Player,
    Sign,
}

impl ThingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThingType::Server => "server",
            ThingType::Player => "player",
            ThingType::Sign => "sign",
        }
    }
}

impl fmt::Display for ThingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThingType {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "server" => Ok(ThingType::Server),
            "player" => Ok(ThingType::Player),
            "sign" => Ok(ThingType::Sign),
            other => Err(DiscoveryError::InvalidUid(format!("unknown thing type '{other}'"))),
        }
    }
}

/// Identifier of a server, player or sign
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThingUid {
    thing_type: ThingType,
    id: String,
}

impl ThingUid {
    /// Create a uid, rejecting ids with reserved characters
    pub fn new(thing_type: ThingType, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_valid_id(&id) {
            return Err(DiscoveryError::InvalidUid(format!("{BINDING_ID}:{thing_type}:{id}")));
        }
        Ok(Self { thing_type, id })
    }

    /// Server uid derived from a host name or address
    ///
    /// Every character outside `[A-Za-z0-9_-]` becomes `_`, so
    /// `10.0.0.5` maps to `10_0_0_5` and IPv6 colons are replaced as well.
    pub fn server_for_host(host: &str) -> Self {
        let id: String = host
            .chars()
            .map(|c| if is_id_char(c) { c } else { '_' })
            .collect();

        Self {
            thing_type: ThingType::Server,
            id: if id.is_empty() { "_".to_string() } else { id },
        }
    }

    /// Uid of a player or sign owned by `parent`
    ///
    /// The id is a truncated SHA-256 of the parent uid and the element name,
    /// stable across restarts and rediscovery.
    pub fn child(thing_type: ThingType, parent: &ThingUid, name: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(parent.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());

        let mut id = format!("{:x}", hasher.finalize());
        id.truncate(CHILD_ID_LEN);

        Self { thing_type, id }
    }

    pub fn thing_type(&self) -> ThingType {
        self.thing_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ThingUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", BINDING_ID, self.thing_type, self.id)
    }
}

impl FromStr for ThingUid {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(BINDING_ID), Some(thing_type), Some(id)) => {
                ThingUid::new(thing_type.parse()?, id)
            }
            _ => Err(DiscoveryError::InvalidUid(s.to_string())),
        }
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(is_id_char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.0.0.5", "10_0_0_5")]
    #[case("fe80::1", "fe80__1")]
    #[case("mc.example.org", "mc_example_org")]
    #[case("lobby-1", "lobby-1")]
    fn test_server_for_host(#[case] host: &str, #[case] expected: &str) {
        let uid = ThingUid::server_for_host(host);
        assert_eq!(uid.id(), expected);
        assert_eq!(uid.thing_type(), ThingType::Server);
        assert!(!uid.id().contains('.'));
    }

    #[test]
    fn test_display_and_parse() {
        let uid = ThingUid::server_for_host("10.0.0.5");
        assert_eq!(uid.to_string(), "minecraft:server:10_0_0_5");

        let parsed: ThingUid = "minecraft:server:10_0_0_5".parse().unwrap();
        assert_eq!(parsed, uid);
    }

    #[rstest]
    #[case("minecraft:server:10.0.0.5")]
    #[case("minecraft:chest:abc")]
    #[case("other:server:abc")]
    #[case("minecraft:server")]
    #[case("minecraft:server:")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<ThingUid>().is_err());
    }

    #[test]
    fn test_child_is_stable_and_scoped_to_parent() {
        let lobby = ThingUid::server_for_host("10.0.0.5");
        let survival = ThingUid::server_for_host("10.0.0.6");

        let alice = ThingUid::child(ThingType::Player, &lobby, "Alice");
        assert_eq!(alice, ThingUid::child(ThingType::Player, &lobby, "Alice"));
        assert_ne!(alice, ThingUid::child(ThingType::Player, &survival, "Alice"));
        assert_ne!(alice, ThingUid::child(ThingType::Player, &lobby, "Bob"));

        assert_eq!(alice.id().len(), CHILD_ID_LEN);
        assert!(alice.id().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(alice.to_string().parse::<ThingUid>().is_ok());
    }

    #[test]
    fn test_child_names_with_reserved_characters() {
        let lobby = ThingUid::server_for_host("10.0.0.5");
        let sign = ThingUid::child(ThingType::Sign, &lobby, "spawn.door:north");
        assert!(!sign.id().contains('.'));
        assert!(!sign.id().contains(':'));
    }
}
