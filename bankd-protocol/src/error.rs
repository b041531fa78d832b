//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    EmptyFrame,

    #[error("invalid status byte: {0:#04x}")]
    InvalidStatus(u8),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidStatus(0x07);
        assert!(err.to_string().contains("0x07"));

        let err = ProtocolError::FrameTooLarge {
            size: 2048,
            max: 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));

        assert!(ProtocolError::InvalidUtf8.to_string().contains("UTF-8"));
        assert_eq!(ProtocolError::EmptyFrame.to_string(), "empty frame");
    }
}
