//! Configuration for discovery scans

use std::time::Duration;

use crate::error::DiscoveryError;

/// Service name advertised by game servers running the telemetry plugin
pub const DEFAULT_SERVICE_NAME: &str = "wc-minecraft";

/// Configuration for the discovery service
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    /// Only advertisements with exactly this name are considered
    pub service_name: String,

    /// How long a scan runs before it stops on its own
    pub scan_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            scan_timeout: Duration::from_secs(60),
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.service_name.trim().is_empty() {
            return Err(DiscoveryError::Configuration(
                "service_name must not be empty".to_string(),
            ));
        }

        if self.scan_timeout.is_zero() {
            return Err(DiscoveryError::Configuration(
                "scan_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }
}
