//! API route handlers for the gateway.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use wattwatch_core::types::RunStatus;

use super::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "wattwatch-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Bot and scheduler status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.engine.status();
    Json(serde_json::json!({
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "scheduler": snapshot,
    }))
}

/// Run a full crawl now. Long call: the portal round trip takes tens of
/// seconds. Rejects with 409 when a run is already in flight.
pub async fn trigger_crawl(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.engine.trigger_manual().await {
        Ok(outcome) => {
            let code = match outcome.status {
                RunStatus::Success => StatusCode::OK,
                RunStatus::Partial => StatusCode::MULTI_STATUS,
                RunStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (code, Json(serde_json::json!({ "ok": outcome.status == RunStatus::Success, "outcome": outcome })))
        }
        Err(busy) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "ok": false, "error": busy.to_string() })),
        ),
    }
}

/// Run yesterday's rollup now.
pub async fn trigger_rollup(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.engine.trigger_rollup().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "ok": true }))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}

#[derive(Deserialize)]
pub struct RecordsQuery {
    limit: Option<u32>,
}

/// Most recent readings, newest first.
pub async fn latest_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> (StatusCode, Json<serde_json::Value>) {
    let limit = query.limit.unwrap_or(10).min(500);
    match state.store.latest(limit).await {
        Ok(records) => (
            StatusCode::OK,
            Json(serde_json::json!({ "ok": true, "count": records.len(), "records": records })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "ok": false, "error": e.to_string() })),
        ),
    }
}
