//! Error types for ceresprom-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Empty metric name")]
    EmptyMetric,

    #[error("Empty label name")]
    EmptyLabelName,

    #[error("No metric name found in labels")]
    NoMetricName,

    #[error("Unknown match type {0}")]
    UnsupportedMatchType(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
