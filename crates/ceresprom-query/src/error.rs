//! Query error types

use ceresprom_core::{CoreError, MatchType};
use thiserror::Error;

/// Query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{label} label must use equal match, current: {match_type}")]
    InvalidMatcher { label: String, match_type: MatchType },

    #[error("Unknown match type {0}")]
    UnsupportedMatchType(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

impl From<CoreError> for QueryError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnsupportedMatchType(op) => QueryError::UnsupportedMatchType(op),
            other => QueryError::InvalidQuery(other.to_string()),
        }
    }
}
