//! Storage error types

use std::time::Duration;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote error (code {code}): {message}")]
    Remote { code: u32, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid point: {0}")]
    InvalidPoint(#[from] ceresprom_core::CoreError),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StorageError::Decode(e.to_string())
        } else {
            StorageError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Decode(e.to_string())
    }
}
