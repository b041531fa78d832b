//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] bankd_protocol::ProtocolError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timeout")]
    Timeout,

    /// The server answered with a `Failure` frame.
    #[error("server failure: {0}")]
    Failed(String),

    /// The server asked for input the current call cannot provide.
    #[error("unexpected sub-request: {0}")]
    UnexpectedRequest(String),

    #[error("bad response: {0}")]
    BadResponse(String),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ConnectionClosed
        )
    }

    /// Returns the failure text sent by the server, if any.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            ClientError::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::Failed("Wrong PIN".to_string()).is_retryable());
        assert!(!ClientError::UnexpectedRequest("authcode".to_string()).is_retryable());
    }

    #[test]
    fn test_failure_message() {
        let err = ClientError::Failed("Insufficient funds".to_string());
        assert_eq!(err.failure_message(), Some("Insufficient funds"));
        assert_eq!(ClientError::Timeout.failure_message(), None);
    }
}
