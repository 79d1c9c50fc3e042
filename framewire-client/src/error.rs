//! Client error types.

use framewire_protocol::MessageType;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] framewire_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    #[error("expected {expected} reply, got {actual}")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::Rejected("no".to_string()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = ClientError::UnexpectedResponse {
            expected: MessageType::Pong,
            actual: MessageType::HelloResponse,
        };
        assert_eq!(err.to_string(), "expected Pong(15) reply, got HelloResponse(17)");
    }
}
