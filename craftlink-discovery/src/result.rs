//! Discovery results and the sink they are reported to

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::ids::{ThingType, ThingUid};

pub const PROPERTY_HOSTNAME: &str = "hostname";
pub const PROPERTY_PORT: &str = "port";
pub const PROPERTY_PLAYER_NAME: &str = "playerName";
pub const PROPERTY_SIGN_NAME: &str = "signName";

/// A discovered server, player or sign
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResult {
    #[serde(serialize_with = "serialize_uid")]
    pub uid: ThingUid,
    pub label: String,
    pub properties: BTreeMap<String, Value>,
    /// Owning server, by reference
    #[serde(serialize_with = "serialize_bridge")]
    pub bridge: Option<ThingUid>,
}

impl DiscoveryResult {
    /// A server reachable at `host:port`
    pub fn server(host: &str, port: u16) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(PROPERTY_HOSTNAME.to_string(), Value::from(host));
        properties.insert(PROPERTY_PORT.to_string(), Value::from(port));

        Self {
            uid: ThingUid::server_for_host(host),
            label: format!("Minecraft Server ({host})"),
            properties,
            bridge: None,
        }
    }

    /// A player seen on the `bridge` server
    pub fn player(bridge: &ThingUid, name: &str) -> Self {
        Self::child(ThingType::Player, bridge, PROPERTY_PLAYER_NAME, name, "Player")
    }

    /// A sign seen on the `bridge` server
    pub fn sign(bridge: &ThingUid, name: &str) -> Self {
        Self::child(ThingType::Sign, bridge, PROPERTY_SIGN_NAME, name, "Sign")
    }

    fn child(
        thing_type: ThingType,
        bridge: &ThingUid,
        property: &str,
        name: &str,
        noun: &str,
    ) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(property.to_string(), Value::from(name));

        Self {
            uid: ThingUid::child(thing_type, bridge, name),
            label: format!("Minecraft {noun} ({name})"),
            properties,
            bridge: Some(bridge.clone()),
        }
    }

    pub fn thing_type(&self) -> ThingType {
        self.uid.thing_type()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

fn serialize_uid<S: serde::Serializer>(uid: &ThingUid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(uid)
}

fn serialize_bridge<S: serde::Serializer>(
    bridge: &Option<ThingUid>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bridge {
        Some(uid) => serializer.collect_str(uid),
        None => serializer.serialize_none(),
    }
}

/// Receiver of discovery results
pub trait DiscoverySink: Send + Sync + 'static {
    fn thing_discovered(&self, result: DiscoveryResult);
}

impl DiscoverySink for mpsc::UnboundedSender<DiscoveryResult> {
    fn thing_discovered(&self, result: DiscoveryResult) {
        if let Err(e) = self.send(result) {
            debug!(uid = %e.0.uid, "Discovery sink closed, result dropped");
        }
    }
}
