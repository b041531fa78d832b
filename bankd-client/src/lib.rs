//! # bankd-client
//!
//! Client library for bankd.
//!
//! This crate provides:
//! - Async TCP connection speaking either wire mode
//! - High-level API for every teller command
//! - Automatic answers to the server's sub-requests

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
