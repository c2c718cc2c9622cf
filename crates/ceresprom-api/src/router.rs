//! API router setup

use crate::handlers::{self, AppState};
use axum::http::StatusCode;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the API router
///
/// The remote-write route is only mounted when `state.remote_write` is set.
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/ceresdb/query", post(handlers::ceresdb_query))
        .route("/api/v1/ceresdb/write", post(handlers::ceresdb_write));

    if state.remote_write {
        router = router.route("/api/v1/write", post(handlers::remote_write));
    }

    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
