//! Source management and switching handlers
//!
//! Handles source registration, listing, removal, and switching.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::SwitchOutcome;
use crate::error::{EngineError, RegistryError, ServerResult};
use crate::state::AppState;

/// Request to register a source
#[derive(Debug, Deserialize)]
pub struct AddSourceRequest {
    /// Unique source name
    pub name: String,
    /// File path, network URL or device id
    pub locator: String,
}

/// Request to switch the output to a named source
#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    /// Registered source name
    pub name: String,
    /// Fade window; the configured default when absent
    pub crossfade_secs: Option<f64>,
    /// Hard switch without a crossfade
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchStatus {
    /// Immediate switch done
    Success,
    /// Crossfade under way
    Switching,
    AlreadyActive,
    Invalid,
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub status: SwitchStatus,
    /// Source name active before the request, if known
    pub from: Option<String>,
    /// Requested source name
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /sources
pub async fn list_sources(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.registry.list())
}

/// POST /sources
pub async fn add_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddSourceRequest>,
) -> ServerResult<Response> {
    let replaced = state.registry.add(&request.name, &request.locator)?;
    tracing::info!(name = %request.name, locator = %request.locator, "source added");

    let status = if replaced.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(serde_json::json!({ "status": "added", "name": request.name })),
    )
        .into_response())
}

/// DELETE /sources/{name}
pub async fn remove_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ServerResult<Json<serde_json::Value>> {
    if !state.registry.remove(&name)? {
        return Err(RegistryError::NotFound(name).into());
    }
    tracing::info!(name = %name, "source removed");
    Ok(Json(serde_json::json!({ "status": "removed", "name": name })))
}

/// POST /switch
pub async fn switch_source(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwitchRequest>,
) -> Response {
    let (_, from) = state.status();

    let locator = match state.registry.resolve(&request.name) {
        Ok(locator) => locator,
        Err(e) => {
            return reply(
                StatusCode::NOT_FOUND,
                SwitchStatus::Invalid,
                from,
                request.name,
                Some(e.to_string()),
            )
        }
    };

    let result = if request.immediate {
        state.engine.inject(&locator).await
    } else {
        let fade = state.engine.config().fade_window(request.crossfade_secs);
        state.engine.crossfade(&locator, fade).await
    };

    match result {
        Ok(SwitchOutcome::AlreadyActive) => reply(
            StatusCode::OK,
            SwitchStatus::AlreadyActive,
            from,
            request.name,
            None,
        ),
        Ok(_) => {
            let status = if request.immediate {
                SwitchStatus::Success
            } else {
                SwitchStatus::Switching
            };
            reply(StatusCode::OK, status, from, request.name, None)
        }
        Err(e) if e.is_validation() => {
            let status = if request.immediate {
                SwitchStatus::Invalid
            } else {
                SwitchStatus::Failed
            };
            reply(
                StatusCode::UNPROCESSABLE_ENTITY,
                status,
                from,
                request.name,
                Some(e.to_string()),
            )
        }
        Err(e) => {
            let code = match e {
                EngineError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            reply(code, SwitchStatus::Failed, from, request.name, Some(e.to_string()))
        }
    }
}

fn reply(
    code: StatusCode,
    status: SwitchStatus,
    from: Option<String>,
    to: String,
    error: Option<String>,
) -> Response {
    (
        code,
        Json(SwitchResponse {
            status,
            from,
            to,
            error,
        }),
    )
        .into_response()
}
