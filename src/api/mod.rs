//! Thin administrative HTTP surface over the scan manager.

pub mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::errors::GatecheckError;
use crate::registry::ScanManager;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ScanManager>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/contexts/:id/scan", post(routes::start_scan))
        .route("/api/contexts/:id/scan/status", get(routes::scan_status))
        .route("/api/contexts/:id/scan/progress", get(routes::scan_progress))
        .route("/api/contexts/:id/scan/results", get(routes::scan_results))
        .route("/api/contexts/:id/scan/report", get(routes::scan_report))
        .route("/api/contexts/:id/scan/pause", post(routes::pause_scan))
        .route("/api/contexts/:id/scan/resume", post(routes::resume_scan))
        .route("/api/contexts/:id/scan/stop", post(routes::stop_scan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Maps engine errors onto HTTP responses.
pub(crate) fn error_response(error: GatecheckError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        GatecheckError::AlreadyRunning(_) => StatusCode::CONFLICT,
        GatecheckError::ModeViolation(_) => StatusCode::FORBIDDEN,
        GatecheckError::UnknownContext(_) | GatecheckError::NoScan(_) => StatusCode::NOT_FOUND,
        GatecheckError::Config(_) | GatecheckError::UnknownUser(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() })))
}
