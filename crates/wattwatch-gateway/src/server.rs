//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use wattwatch_core::error::{Result, WattError};
use wattwatch_core::ReadingStore;
use wattwatch_scheduler::ScheduleEngine;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScheduleEngine>,
    pub store: Arc<dyn ReadingStore>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(super::routes::health_check))
        .route("/api/v1/status", get(super::routes::status))
        .route("/api/v1/crawl", post(super::routes::trigger_crawl))
        .route("/api/v1/rollup", post(super::routes::trigger_rollup))
        .route("/api/v1/records", get(super::routes::latest_records))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(shared)
}

/// Bind and serve until the process exits.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WattError::Config(format!("gateway bind {addr} failed: {e}")))?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| WattError::Config(format!("gateway server error: {e}")))?;
    Ok(())
}
