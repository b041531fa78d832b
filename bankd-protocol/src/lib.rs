//! # bankd-protocol
//!
//! Wire protocol implementation for bankd.
//!
//! This crate provides:
//! - Status-byte framing (`Failure`, `Success`, `Request`)
//! - Zero-padded and length-prefixed wire modes
//! - Client command and server sub-request names
//! - Protocol error types

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::{Decoder, WireMode};
pub use error::ProtocolError;
pub use frame::{decode, encode, trim_padding, StatusCode, LENGTH_PREFIX_SIZE};
pub use message::{Command, SubRequest};

/// Default TCP port for the bankd server.
pub const DEFAULT_PORT: u16 = 1337;

/// Upper bound for any single message body, in bytes.
///
/// Every receive buffer on both ends is this large. It covers command tokens,
/// credentials, amounts, and welcome text alike.
pub const MAX_FRAME_SIZE: usize = 1024;
