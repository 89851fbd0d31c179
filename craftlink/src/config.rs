//! Thing and binding configuration
//!
//! Thing configs are loaded by whatever hosts the binding; they only need
//! to deserialize. [`BindingConfig`] collects the stream and discovery
//! settings and can be overridden from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use craftlink_discovery::DiscoveryConfig;
use craftlink_stream::StreamConfig;

use crate::error::{BindingError, Result};

/// Port the telemetry plugin listens on by default
pub const DEFAULT_PORT: u16 = 10692;

/// Configuration of a server thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ServerConfig {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(BindingError::Configuration("hostname must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(BindingError::Configuration("port must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Configuration of a player thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
}

impl PlayerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Configuration of a sign thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignConfig {
    pub name: String,
}

impl SignConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Settings shared by every thing of a binding
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingConfig {
    pub stream: StreamConfig,
    pub discovery: DiscoveryConfig,
}

impl BindingConfig {
    /// Defaults overridden by environment variables
    ///
    /// - `CRAFTLINK_RETRY_DELAY_SECS`
    /// - `CRAFTLINK_CONNECT_TIMEOUT_SECS`
    /// - `CRAFTLINK_SCAN_TIMEOUT_SECS`
    /// - `CRAFTLINK_SERVICE_NAME`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(secs) = read_secs(&lookup, "CRAFTLINK_RETRY_DELAY_SECS")? {
            config.stream.retry_delay = secs;
        }
        if let Some(secs) = read_secs(&lookup, "CRAFTLINK_CONNECT_TIMEOUT_SECS")? {
            config.stream.connect_timeout = secs;
        }
        if let Some(secs) = read_secs(&lookup, "CRAFTLINK_SCAN_TIMEOUT_SECS")? {
            config.discovery.scan_timeout = secs;
        }
        if let Some(name) = lookup("CRAFTLINK_SERVICE_NAME") {
            config.discovery.service_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        self.discovery.validate()?;
        Ok(())
    }
}

fn read_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| BindingError::Configuration(format!("{key}={value}: {e}"))),
        None => Ok(None),
    }
}
