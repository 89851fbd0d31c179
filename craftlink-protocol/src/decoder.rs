//! Frame decoding
//!
//! A frame is one line of text read off the socket. The connection layer only
//! depends on [`RecordDecoder`]; [`JsonLineDecoder`] is the format spoken by the
//! server plugin.

use crate::error::{DecodeError, DecodeResult};
use crate::record::Record;

/// Maximum allowed frame size (1MB)
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Turns one raw frame into a typed [`Record`].
///
/// Implementations must be stateless with respect to framing: the caller
/// splits the byte stream and passes one frame at a time.
pub trait RecordDecoder: Send + Sync {
    /// Decode a single frame
    fn decode(&self, frame: &str) -> DecodeResult<Record>;
}

/// Decoder for newline-delimited JSON records.
#[derive(Debug, Clone)]
pub struct JsonLineDecoder {
    max_frame_len: usize,
}

impl JsonLineDecoder {
    /// Create a decoder rejecting frames longer than `max_frame_len` bytes
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Get the frame size limit
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for JsonLineDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl RecordDecoder for JsonLineDecoder {
    fn decode(&self, frame: &str) -> DecodeResult<Record> {
        if frame.len() > self.max_frame_len {
            return Err(DecodeError::FrameTooLarge {
                len: frame.len(),
                max: self.max_frame_len,
            });
        }

        let payload = frame.trim();
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
