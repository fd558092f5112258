//! Observability HTTP Routes
//!
//! Health check and coordinator metrics.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::coordinator::SleepCoordinator;
use crate::observability::MetricsSnapshot;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// State being entered; "on" when idle
    pub current_state: String,
    pub transition_in_progress: bool,
    pub async_worker: bool,
}

/// Create observability routes
pub fn observability_routes(coordinator: Arc<SleepCoordinator>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(coordinator)
}

/// Health check handler
async fn health_handler(State(coordinator): State<Arc<SleepCoordinator>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        current_state: coordinator.current_state().to_string(),
        transition_in_progress: coordinator.transition_in_progress(),
        async_worker: coordinator.uses_worker(),
    };

    (StatusCode::OK, Json(response))
}

/// Metrics handler - returns the coordinator's counters as JSON
async fn metrics_handler(
    State(coordinator): State<Arc<SleepCoordinator>>,
) -> Json<MetricsSnapshot> {
    Json(coordinator.metrics_snapshot())
}
