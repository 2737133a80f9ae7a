use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::alerts::RiskLevel;
use crate::errors::GatecheckError;
use crate::scanner::ScanStartOptions;

use super::{error_response, AppState};

type ApiError = (StatusCode, Json<Value>);

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "gatecheck" }))
}

#[derive(Deserialize)]
pub struct StartScanRequest {
    #[serde(default)]
    pub user_ids: Vec<i64>,
    #[serde(default)]
    pub include_unauthenticated: bool,
    #[serde(default)]
    pub raise_alerts: bool,
    /// One of `info`, `low`, `medium`, `high`. Defaults to `medium`.
    #[serde(default)]
    pub risk_level: Option<String>,
}

pub async fn start_scan(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
    Json(req): Json<StartScanRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let context = state
        .manager
        .provider()
        .context(context_id)
        .ok_or_else(|| error_response(GatecheckError::UnknownContext(context_id)))?;
    let users = state
        .manager
        .resolve_users(context_id, &req.user_ids)
        .map_err(error_response)?;
    let risk: RiskLevel = req
        .risk_level
        .as_deref()
        .unwrap_or("medium")
        .parse()
        .map_err(error_response)?;
    let options = ScanStartOptions::new(
        context,
        users,
        req.include_unauthenticated,
        req.raise_alerts,
        risk,
    )
    .map_err(error_response)?;

    state.manager.start_scan(options).map_err(error_response)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "context_id": context_id, "status": "started" })),
    ))
}

pub async fn scan_status(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Json<Value> {
    Json(json!({
        "context_id": context_id,
        "status": state.manager.scan_status(context_id),
    }))
}

pub async fn scan_progress(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let percent = state
        .manager
        .scan_progress(context_id)
        .map_err(error_response)?;
    let (progress, maximum) = state
        .manager
        .scanner(context_id)
        .map(|s| s.progress())
        .unwrap_or((0, 0));
    Ok(Json(json!({
        "context_id": context_id,
        "progress": progress,
        "maximum": maximum,
        "percent": percent,
    })))
}

pub async fn scan_results(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let scanner = state
        .manager
        .scanner(context_id)
        .ok_or_else(|| error_response(GatecheckError::NoScan(context_id)))?;
    match scanner.last_results() {
        Some(results) => Ok(Json(json!({
            "context_id": context_id,
            "results": &*results,
            "total": results.len(),
        }))),
        None => Ok(Json(json!({
            "context_id": context_id,
            "results": Value::Null,
            "total": 0,
        }))),
    }
}

pub async fn scan_report(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let report = state
        .manager
        .last_scan_report(context_id)
        .map_err(error_response)?;
    Ok(Html(crate::report::render_html(&report)))
}

pub async fn pause_scan(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.manager.pause_scan(context_id).map_err(error_response)?;
    Ok(Json(json!({ "context_id": context_id, "paused": true })))
}

pub async fn resume_scan(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.manager.resume_scan(context_id).map_err(error_response)?;
    Ok(Json(json!({ "context_id": context_id, "paused": false })))
}

pub async fn stop_scan(
    State(state): State<AppState>,
    Path(context_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.manager.stop_scan(context_id).map_err(error_response)?;
    Ok(Json(json!({ "context_id": context_id, "stopped": true })))
}
