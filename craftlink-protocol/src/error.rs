//! Error types for record decoding

use thiserror::Error;

/// Errors that can occur while decoding a frame into a [`crate::Record`]
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The frame carried no payload
    #[error("Empty frame")]
    Empty,

    /// The frame exceeded the configured size limit
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The payload was not a well-formed record
    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Result type alias for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;
