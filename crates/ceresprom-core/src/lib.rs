//! ceresprom Core - Shared types for the PromQL to CeresDB bridge
//!
//! This crate provides the fundamental data types used throughout ceresprom:
//! - `Label` / `Labels`: Canonically sorted label sets, including the
//!   reserved `__name__` metric-name label
//! - `Matcher` / `MatchType`: PromQL label matchers
//! - `Point`: A write-path data point (metric, tags, timestamp, fields)
//! - `SingleFieldPoint`: The JSON write payload carrying a single `value`

pub mod error;
pub mod labels;
pub mod types;

pub use error::{CoreError, Result};
pub use labels::*;
pub use types::*;
