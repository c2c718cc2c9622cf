//! ceresprom API - HTTP endpoints in front of the remote store
//!
//! This crate provides the HTTP surface:
//! - Selector query endpoint planned through pushdown
//! - JSON write endpoint for single-field points
//! - Remote-write ingestion routed through the appender
//! - Health endpoint

pub mod error;
pub mod handlers;
pub mod router;

pub use error::{ApiError, Result};
pub use handlers::AppState;
pub use router::create_router;
