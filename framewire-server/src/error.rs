//! Server error types.

use framewire_protocol::{MessageType, ProtocolError};
use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("handler for {expected} received {actual}")]
    UnexpectedBody {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether the connection must be closed after this error.
    pub fn closes_connection(&self) -> bool {
        match self {
            ServerError::Io(_) | ServerError::ShuttingDown => true,
            ServerError::Protocol(e) => e.is_fatal(),
            ServerError::UnexpectedBody { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_close_connection() {
        let err = ServerError::from(ProtocolError::InvalidMagic([0; 4]));
        assert!(err.closes_connection());

        let err = ServerError::from(ProtocolError::SerializationFailure("x".to_string()));
        assert!(!err.closes_connection());
    }

    #[test]
    fn test_handler_errors_keep_connection() {
        let err = ServerError::UnexpectedBody {
            expected: MessageType::Ping,
            actual: MessageType::Pong,
        };
        assert!(!err.closes_connection());
        assert_eq!(err.to_string(), "handler for Ping(14) received Pong(15)");
    }
}
