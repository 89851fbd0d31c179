//! # craftlink-protocol
//!
//! Typed telemetry records published by a game server, and the decoder seam
//! that turns raw frames into those records.
//!
//! The connection layer in `craftlink-stream` never looks at bytes itself. It
//! hands every frame it reads to a [`RecordDecoder`] and routes the resulting
//! [`Record`] by its [`RecordKind`].
//!
//! ## Usage
//!
//! ```rust
//! use craftlink_protocol::{JsonLineDecoder, Record, RecordDecoder};
//!
//! let decoder = JsonLineDecoder::default();
//! let frame = r#"{"type":"players","data":[]}"#;
//!
//! match decoder.decode(frame).unwrap() {
//!     Record::Players(players) => assert!(players.is_empty()),
//!     other => panic!("unexpected record {:?}", other),
//! }
//! ```

pub mod decoder;
pub mod error;
pub mod record;

// Re-export error types for convenient top-level access
pub use error::{DecodeError, DecodeResult};

pub use decoder::{JsonLineDecoder, RecordDecoder, DEFAULT_MAX_FRAME_LEN};
pub use record::{Location, Player, Record, RecordKind, ServerStatus, Sign};
