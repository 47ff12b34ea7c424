use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::EngineStatus;
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Default number of process log lines returned by `/logs`
const DEFAULT_LOG_LINES: usize = 200;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Version information endpoint
pub async fn version_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Registry name of the active locator, when it has one
    pub active_source: Option<String>,
    #[serde(flatten)]
    pub engine: EngineStatus,
    pub source_count: usize,
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (engine, active_source) = state.status();
    Json(StatusResponse {
        active_source,
        engine,
        source_count: state.registry.list().len(),
    })
}

/// POST /reset
pub async fn reset(State(state): State<Arc<AppState>>) -> ServerResult<Json<serde_json::Value>> {
    state.engine.reset().await?;
    Ok(Json(serde_json::json!({
        "status": "reset",
        "resets": state.engine.status().resets,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

/// GET /logs
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogQuery>,
) -> ServerResult<Response> {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    let tail = state
        .engine
        .process_log()
        .tail(lines)
        .map_err(ServerError::Io)?;

    let mut body = tail.join("\n");
    body.push('\n');
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}
