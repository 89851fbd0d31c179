//! Error types for the craftlink-stream crate.

use craftlink_protocol::DecodeError;

use crate::endpoint::Endpoint;

/// Errors raised by a single connection attempt or by stream setup.
///
/// None of these reach subscribers of a [`crate::SharedServerStream`]: the
/// retry worker turns them into [`crate::LinkState::Offline`] and tries again.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The socket could not be opened
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// The socket did not open within the configured timeout
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(Endpoint),

    /// Reading from an established socket failed
    #[error("Connection to {endpoint} lost: {source}")]
    Io {
        endpoint: Endpoint,
        #[source]
        source: std::io::Error,
    },

    /// A frame could not be decoded; the stream is no longer trusted
    #[error("Failed to decode record from {endpoint}: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: DecodeError,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Shared streams spawn their workers on the runtime they were created in
    #[error("No tokio runtime available to drive the connection")]
    NoRuntime,
}

impl StreamError {
    /// Whether the error came from the socket rather than from the payload
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StreamError::Connect { .. } | StreamError::ConnectTimeout(_) | StreamError::Io { .. }
        )
    }

    /// Whether the error came from a malformed frame
    pub fn is_decode_error(&self) -> bool {
        matches!(self, StreamError::Decode { .. })
    }
}

/// Errors from server registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A server with this identity is already registered
    #[error("Server already registered: {0}")]
    AlreadyRegistered(String),

    /// Another server already owns this endpoint
    #[error("Endpoint {endpoint} already registered by {owner}")]
    EndpointInUse { endpoint: Endpoint, owner: String },

    /// No server with this identity is registered
    #[error("Server not found: {0}")]
    NotFound(String),

    /// The shared stream for the server could not be created
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Convenience type alias for Results using RegistryError.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
