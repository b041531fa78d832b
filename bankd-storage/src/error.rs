//! Storage error types.

use crate::account::AccountId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("card number already registered")]
    DuplicateCard,

    #[error("balance update conflict on account {0}")]
    Conflict(AccountId),

    #[error("store {} is locked by another process", .0.display())]
    Locked(PathBuf),

    #[error("data corruption: {0}")]
    Corruption(String),
}
