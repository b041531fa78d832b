//! # bankd-server
//!
//! TCP server for bankd.
//!
//! This crate provides:
//! - TCP connection handling with async I/O
//! - Status-byte framing in padded or length-prefixed mode
//! - Session management with a sliding idle timeout
//! - Command handlers with nested sub-requests
//! - PIN verification
//! - Optional Prometheus metrics endpoint

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod server;
pub mod session;
pub mod welcome;

pub use auth::PinVerifier;
pub use config::{Config, MetricsConfig, NetworkConfig, StorageConfig, WelcomeConfig};
pub use error::ServerError;
pub use handler::{CommandHandler, MAX_BALANCE_UPDATE_ATTEMPTS};
pub use metrics::Metrics;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{Session, SessionConfig};
pub use welcome::WelcomeMessages;
