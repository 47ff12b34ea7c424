//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{health_check, logs, reset, status, version_check};
use super::sources::{add_source, list_sources, remove_source, switch_source};

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_enabled = state.config.cors_enabled;

    let router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Sources
        .route("/sources", get(list_sources).post(add_source))
        .route("/sources/{name}", delete(remove_source))
        // Engine control
        .route("/switch", post(switch_source))
        .route("/status", get(status))
        .route("/reset", post(reset))
        .route("/logs", get(logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if !cors_enabled {
        return router;
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
        .max_age(Duration::from_secs(3600));

    router.layer(cors)
}
