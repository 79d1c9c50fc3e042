//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing, encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected [1, 2, 3, 4], got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported serializer ordinal: {0}")]
    UnsupportedSerializer(u8),

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("malformed payload for message type {message_type}: {reason}")]
    MalformedPayload { message_type: u8, reason: String },

    #[error("serialization failed: {0}")]
    SerializationFailure(String),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("incomplete frame: need {needed} more bytes")]
    IncompleteFrame { needed: usize },

    #[error("payload length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch { declared: u32, actual: usize },

    #[error("message type {0} registered twice")]
    DuplicateMessageType(u8),

    #[error("message registry already installed")]
    RegistryFrozen,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error leaves the byte stream unusable.
    ///
    /// There is no resynchronization after a bad frame, so every decode-side
    /// error must close the connection.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ProtocolError::SerializationFailure(_)
                | ProtocolError::DuplicateMessageType(_)
                | ProtocolError::RegistryFrozen
        )
    }
}
