//! Server error types.

use thiserror::Error;

/// Server errors.
///
/// Fatal variants end the session without a reply. Every other variant is
/// reported to the client as a `Failure` frame and the session continues.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] bankd_protocol::ProtocolError),

    #[error("storage error: {0}")]
    Storage(#[from] bankd_storage::StorageError),

    #[error("framing error: {0}")]
    Framing(bankd_protocol::ProtocolError),

    #[error("idle timeout")]
    IdleTimeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("server shutting down")]
    ShuttingDown,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("session not authenticated")]
    NotAuthenticated,

    #[error("no matching account found")]
    AccountNotFound,

    #[error("wrong PIN")]
    WrongPin,

    #[error("wrong code")]
    WrongCode,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid language code: {0}")]
    InvalidLanguage(String),

    #[error("could not load welcome message: {0}")]
    WelcomeMessage(String),
}

impl ServerError {
    /// Returns whether the error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServerError::Io(_)
                | ServerError::Framing(_)
                | ServerError::IdleTimeout
                | ServerError::ConnectionClosed
                | ServerError::ShuttingDown
        )
    }

    /// Text sent to the client in the `Failure` frame.
    pub fn failure_message(&self) -> String {
        match self {
            ServerError::BadRequest(cmd) => format!("Request fallthrough (bad request: {})", cmd),
            ServerError::NotAuthenticated => "Authentication required".to_string(),
            ServerError::AccountNotFound => "No matching account found".to_string(),
            ServerError::WrongPin => "Wrong PIN".to_string(),
            ServerError::WrongCode => "Wrong code".to_string(),
            ServerError::InsufficientFunds => "Insufficient funds".to_string(),
            ServerError::InvalidAmount(text) => format!("Invalid amount: {}", text),
            ServerError::InvalidLanguage(lang) => format!("Unsupported language: {}", lang),
            ServerError::WelcomeMessage(reason) => {
                format!("Could not load welcome message: {}", reason)
            }
            ServerError::Protocol(e) => format!("Malformed request: {}", e),
            ServerError::Storage(_) => "Internal error".to_string(),
            ServerError::Io(_)
            | ServerError::Framing(_)
            | ServerError::IdleTimeout
            | ServerError::ConnectionClosed
            | ServerError::ShuttingDown => "Internal error".to_string(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Io(_) => "io",
            ServerError::Protocol(_) => "protocol",
            ServerError::Storage(_) => "storage",
            ServerError::Framing(_) => "framing",
            ServerError::IdleTimeout => "idle_timeout",
            ServerError::ConnectionClosed => "connection_closed",
            ServerError::ShuttingDown => "shutting_down",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::NotAuthenticated => "not_authenticated",
            ServerError::AccountNotFound => "account_not_found",
            ServerError::WrongPin => "wrong_pin",
            ServerError::WrongCode => "wrong_code",
            ServerError::InsufficientFunds => "insufficient_funds",
            ServerError::InvalidAmount(_) => "invalid_amount",
            ServerError::InvalidLanguage(_) => "invalid_language",
            ServerError::WelcomeMessage(_) => "welcome_message",
        }
    }
}
