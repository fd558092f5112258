//! Power HTTP Routes
//!
//! The control surface over HTTP. Attribute values travel as raw text
//! bodies exactly as a sysfs reader or writer would see them; errors are
//! JSON.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::control::{AttributeInfo, ControlSurface};
use crate::errors::PmError;
use crate::stats::SuspendStatsSnapshot;

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct AttributesResponse {
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Serialize)]
pub struct WriteResponse {
    pub attribute: String,
    pub consumed: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    pub errno: i32,
}

/// A control-surface error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(PmError);

impl From<PmError> for ApiError {
    fn from(e: PmError) -> Self {
        ApiError(e)
    }
}

/// HTTP status for each error kind.
pub fn status_for(error: &PmError) -> StatusCode {
    match error {
        PmError::InvalidInput(_) | PmError::RaceLost { .. } => StatusCode::BAD_REQUEST,
        PmError::Busy => StatusCode::CONFLICT,
        PmError::Interrupted | PmError::ResourceExhaustion(_) => StatusCode::SERVICE_UNAVAILABLE,
        PmError::UnknownAttribute(_) => StatusCode::NOT_FOUND,
        PmError::Unsupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
        PmError::Delegate(_) | PmError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
            errno: self.0.errno(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

fn text(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Run a possibly blocking control-surface call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PmError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError(PmError::ResourceExhaustion(format!("blocking task: {}", e))))?
        .map_err(ApiError)
}

// ==================
// Routes
// ==================

/// Create power routes
pub fn power_routes(surface: Arc<ControlSurface>) -> Router {
    Router::new()
        .route("/power", get(list_handler))
        .route("/power/:name", get(read_handler).put(write_handler))
        .route("/debug/suspend_stats", get(stats_text_handler))
        .route("/debug/suspend_stats.json", get(stats_json_handler))
        .with_state(surface)
}

async fn list_handler(State(surface): State<Arc<ControlSurface>>) -> Json<AttributesResponse> {
    Json(AttributesResponse {
        attributes: surface.list(),
    })
}

async fn read_handler(
    State(surface): State<Arc<ControlSurface>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    // wakeup_count reads wait for in-flight wakeup events.
    let value = blocking(move || surface.read(&name)).await?;
    Ok(text(value))
}

async fn write_handler(
    State(surface): State<Arc<ControlSurface>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let attribute = name.clone();
    let consumed = blocking(move || surface.write(&name, &body)).await?;
    Ok(Json(WriteResponse {
        attribute,
        consumed,
    }))
}

async fn stats_text_handler(State(surface): State<Arc<ControlSurface>>) -> Response {
    text(surface.suspend_stats())
}

async fn stats_json_handler(
    State(surface): State<Arc<ControlSurface>>,
) -> Json<SuspendStatsSnapshot> {
    Json(surface.coordinator().stats_snapshot())
}
