//! # bankd-storage
//!
//! Account store for bankd.
//!
//! This crate provides:
//! - The [`AccountStore`] trait the server depends on
//! - Atomic balance updates and single-use withdrawal codes
//! - [`LocalStore`], an in-memory store with optional JSON file persistence

pub mod account;
pub mod error;
pub mod store;

pub use account::{Account, AccountId, OneTimeCode};
pub use error::StorageError;
pub use store::{AccountStore, LocalStore};
