//! Encoder and decoder for both wire modes.

use crate::error::ProtocolError;
use crate::frame::{self, StatusCode};
use crate::MAX_FRAME_SIZE;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How message boundaries are carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMode {
    /// One socket read is one message, tail zero-padded in a fixed buffer.
    #[default]
    Padded,
    /// Every message carries a big-endian `u16` length prefix.
    LengthPrefixed,
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireMode::Padded => write!(f, "padded"),
            WireMode::LengthPrefixed => write!(f, "length_prefixed"),
        }
    }
}

impl FromStr for WireMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "padded" => Ok(WireMode::Padded),
            "length_prefixed" | "length-prefixed" | "prefixed" => Ok(WireMode::LengthPrefixed),
            other => Err(format!("unknown wire mode: {}", other)),
        }
    }
}

/// Encodes outgoing messages for a wire mode.
pub struct Encoder;

impl Encoder {
    /// Encodes a server message (status byte + payload).
    pub fn encode_response(
        mode: WireMode,
        status: StatusCode,
        payload: &[u8],
    ) -> Result<BytesMut, ProtocolError> {
        let body = frame::encode(payload, status);
        Self::wrap(mode, &body)
    }

    /// Encodes a client message (bare payload).
    pub fn encode_request(mode: WireMode, payload: &[u8]) -> Result<BytesMut, ProtocolError> {
        Self::wrap(mode, payload)
    }

    fn wrap(mode: WireMode, body: &[u8]) -> Result<BytesMut, ProtocolError> {
        match mode {
            WireMode::Padded => {
                if body.len() > MAX_FRAME_SIZE {
                    return Err(ProtocolError::FrameTooLarge {
                        size: body.len(),
                        max: MAX_FRAME_SIZE,
                    });
                }
                Ok(BytesMut::from(body))
            }
            WireMode::LengthPrefixed => frame::encode_length_prefixed(body),
        }
    }
}

/// Buffers partial reads until a complete length-prefixed body is available.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to take the next body from the buffer.
    pub fn decode_body(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        frame::decode_length_prefixed(&mut self.buffer)
    }

    /// Attempts to decode the next server message from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<(StatusCode, Bytes)>, ProtocolError> {
        match self.decode_body()? {
            Some(body) => {
                let (status, payload) = frame::decode(&body)?;
                let payload = body.slice_ref(payload);
                Ok(Some((status, payload)))
            }
            None => Ok(None),
        }
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
