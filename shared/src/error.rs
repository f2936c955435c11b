//! Error types for the message catalog and the player registry.

use thiserror::Error;

use crate::protocol::MsgKind;
use crate::ConnectionHandle;

/// Failures while encoding or decoding a wire frame.
///
/// Every variant is recoverable: receivers log the error and drop the frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message kind tag {0}")]
    UnknownKind(u8),

    #[error("{kind:?} payload truncated: need {needed} bytes, got {available}")]
    Truncated {
        kind: MsgKind,
        needed: usize,
        available: usize,
    },

    #[error("invalid {field} value {value}")]
    InvalidEnum { field: &'static str, value: u8 },

    #[error("string field {field} is not null-terminated")]
    Unterminated { field: &'static str },

    #[error("string field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("target buffer holds {available} bytes, frame needs {needed}")]
    BufferTooSmall { needed: usize, available: usize },

    /// A payload writer disagreed with its declared length. Programming defect.
    #[error("{kind:?} payload wrote {written} bytes, declared {declared}")]
    PayloadLength {
        kind: MsgKind,
        written: usize,
        declared: usize,
    },
}

/// Registry consistency failures. Expected under join/leave races.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("player name {0:?} is already registered")]
    DuplicateName(String),

    #[error("connection {0} already has a registered player")]
    DuplicateIdentity(ConnectionHandle),

    #[error("no player registered for {0}")]
    NotFound(String),
}
