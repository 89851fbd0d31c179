//! Configuration types for the craftlink-stream crate
//!
//! This module defines the knobs of the connection layer: how long to wait
//! before reconnecting after a failure, how long a connect may take, and how
//! large a single frame may grow.

use std::time::Duration;

use craftlink_protocol::DEFAULT_MAX_FRAME_LEN;

use crate::error::StreamError;

/// Configuration for connections and their retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Fixed delay between a failed attempt and the next one.
    /// Retries never stop; there is no attempt budget.
    /// Default: 60 seconds
    pub retry_delay: Duration,

    /// Timeout for opening the socket
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Maximum size of one frame in bytes
    /// Default: 1 MiB
    pub max_frame_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig that reconnects quickly, for servers on the local network
    pub fn fast_retry() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.retry_delay == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Retry delay must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout == Duration::ZERO {
            return Err(StreamError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_frame_len == 0 {
            return Err(StreamError::Configuration(
                "Max frame length must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}
