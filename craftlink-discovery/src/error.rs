//! Error types for the discovery system.

/// Error type for discovery operations.
///
/// A failing discovery listener never stops a scan: the service logs the
/// error and the player and sign fan-outs keep running without it.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The local network listener could not be started
    #[error("Failed to start discovery listener: {0}")]
    Listener(String),

    /// An identifier contains characters outside `[A-Za-z0-9_-]`
    #[error("Invalid thing uid: {0}")]
    InvalidUid(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
