//! ceresprom Query - Pushdown planning for PromQL queries
//!
//! This crate decides how much of a PromQL expression the remote store can
//! evaluate and encodes that part as a delegated expression tree:
//! - `Node`: the closed set of query-tree node kinds the planner inspects
//! - Matcher normalization and selector building (`QueryParam`)
//! - `PushdownHelper`: walks the ancestor path and folds supported nodes
//! - Matrix conversion of series fetched for pushed-down nodes

pub mod error;
pub mod matchers;
pub mod matrix;
pub mod model;
pub mod planner;

pub use error::{QueryError, Result};
pub use matchers::{normalize_matchers, parse_literal_or, PushdownConfig, QueryParam};
pub use matrix::{series_to_matrix, Matrix, MatrixSeries};
pub use model::Node;
pub use planner::{PushdownHelper, PushdownMark, PushdownOutcome, Translated};
