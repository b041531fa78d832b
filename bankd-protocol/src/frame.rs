//! Status-byte frame format.
//!
//! Every server message starts with one status byte followed by UTF-8 text.
//! Client messages are bare text. Receive buffers are fixed-size and
//! zero-initialised, so a short read leaves trailing zero padding that must be
//! stripped on decode.
//!
//! ```text
//! +--------+----------------------+-----------------+
//! | status | payload (UTF-8)      | zero padding... |
//! | 1 byte | n bytes              | unused buffer   |
//! +--------+----------------------+-----------------+
//! ```
//!
//! There is no escaping. A payload that ends in zero bytes cannot be told
//! apart from padding, so payloads must never carry trailing NULs.
//!
//! In length-prefixed mode the same body is preceded by its length:
//!
//! ```text
//! +-------------+-------------------------------------+
//! | body_len    | body (status + payload, or payload) |
//! | u16 BE      | body_len bytes                      |
//! +-------------+-------------------------------------+
//! ```

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the length prefix in length-prefixed mode.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Control byte at the start of every server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    /// The command failed; payload carries the reason.
    Failure = 0,
    /// The command succeeded; payload carries the result.
    Success = 1,
    /// The server needs more input; payload names what it wants.
    Request = 2,
}

impl StatusCode {
    /// Returns the wire byte for this status.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parses a wire byte.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0 => Ok(StatusCode::Failure),
            1 => Ok(StatusCode::Success),
            2 => Ok(StatusCode::Request),
            other => Err(ProtocolError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Failure => write!(f, "FAILURE"),
            StatusCode::Success => write!(f, "SUCCESS"),
            StatusCode::Request => write!(f, "REQUEST"),
        }
    }
}

/// Prepends the status byte to `payload`.
pub fn encode(payload: &[u8], status: StatusCode) -> BytesMut {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8(status.as_byte());
    buf.put_slice(payload);
    buf
}

/// Splits a received server message into its status and payload.
///
/// Trailing zero padding is stripped from the payload.
pub fn decode(raw: &[u8]) -> Result<(StatusCode, &[u8]), ProtocolError> {
    let (&first, rest) = raw.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let status = StatusCode::from_byte(first)?;
    Ok((status, trim_padding(rest)))
}

/// Strips trailing zero bytes left over from a fixed-size receive buffer.
pub fn trim_padding(raw: &[u8]) -> &[u8] {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &raw[..end]
}

/// Wraps a message body in a length prefix.
pub fn encode_length_prefixed(body: &[u8]) -> Result<BytesMut, ProtocolError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    buf.put_u16(body.len() as u16);
    buf.put_slice(body);
    Ok(buf)
}

/// Takes one length-prefixed body off the front of `buf`.
///
/// Returns `Ok(Some(body))` if a complete body was available,
/// `Ok(None)` if more data is needed, or `Err` if the announced length
/// exceeds [`MAX_FRAME_SIZE`].
pub fn decode_length_prefixed(buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let body_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if body_len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body_len,
            max: MAX_FRAME_SIZE,
        });
    }

    if buf.len() < LENGTH_PREFIX_SIZE + body_len {
        return Ok(None);
    }

    buf.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(buf.split_to(body_len).freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_prepends_status() {
        let encoded = encode(b"Authenticated", StatusCode::Success);
        assert_eq!(encoded[0], 1);
        assert_eq!(&encoded[1..], b"Authenticated");

        let encoded = encode(b"get_user", StatusCode::Request);
        assert_eq!(&encoded[..], b"\x02get_user");
    }

    #[test]
    fn test_decode_strips_padding() {
        let mut buf = [0u8; 32];
        buf[0] = StatusCode::Failure.as_byte();
        buf[1..10].copy_from_slice(b"Wrong PIN");

        let (status, payload) = decode(&buf).unwrap();
        assert_eq!(status, StatusCode::Failure);
        assert_eq!(payload, b"Wrong PIN");
    }

    #[test]
    fn test_decode_status_only() {
        let (status, payload) = decode(&[1]).unwrap();
        assert_eq!(status, StatusCode::Success);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(decode(&[]), Err(ProtocolError::EmptyFrame)));
    }

    #[test]
    fn test_decode_invalid_status() {
        assert!(matches!(
            decode(b"\x09oops"),
            Err(ProtocolError::InvalidStatus(9))
        ));
    }

    #[test]
    fn test_trim_padding() {
        assert_eq!(trim_padding(b"login\0\0\0\0\0"), b"login");
        assert_eq!(trim_padding(b"\0\0\0"), b"");
        assert_eq!(trim_padding(b""), b"");
        // Interior zeros are kept
        assert_eq!(trim_padding(b"a\0b\0"), b"a\0b");
    }

    #[test]
    fn test_status_from_byte() {
        assert_eq!(StatusCode::from_byte(0).unwrap(), StatusCode::Failure);
        assert_eq!(StatusCode::from_byte(1).unwrap(), StatusCode::Success);
        assert_eq!(StatusCode::from_byte(2).unwrap(), StatusCode::Request);
        assert!(StatusCode::from_byte(3).is_err());
    }

    #[test]
    fn test_length_prefixed_partial() {
        let encoded = encode_length_prefixed(b"\x01700").unwrap();
        assert_eq!(&encoded[..2], &[0, 4]);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encoded[..3]);
        assert!(decode_length_prefixed(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&encoded[3..]);
        let body = decode_length_prefixed(&mut buf).unwrap().unwrap();
        assert_eq!(&body[..], b"\x01700");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_length_prefixed_too_large() {
        let body = vec![b'x'; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            encode_length_prefixed(&body),
            Err(ProtocolError::FrameTooLarge { .. })
        ));

        let mut buf = BytesMut::new();
        buf.put_u16((MAX_FRAME_SIZE + 1) as u16);
        assert!(matches!(
            decode_length_prefixed(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
