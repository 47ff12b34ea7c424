use std::time::Duration;
use thiserror::Error;

use crate::ffmpeg::ProcessRole;

/// Why a candidate locator was rejected by the decode probe
#[derive(Error, Debug)]
pub enum ValidationFailure {
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),

    #[error("probe exited with status {0}")]
    ExitStatus(String),

    #[error("probe could not be launched: {0}")]
    Launch(#[source] std::io::Error),
}

/// Errors reported by stream engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed for {locator}: {reason}")]
    ValidationFailed {
        locator: String,
        reason: ValidationFailure,
    },

    #[error("Failed to spawn {role} process: {source}")]
    Spawn {
        role: ProcessRole,
        #[source]
        source: std::io::Error,
    },

    #[error("Conduit error: {0}")]
    Conduit(#[from] std::io::Error),

    #[error("Engine has been shut down")]
    ShutDown,
}

impl EngineError {
    /// True when the switch was refused because the candidate failed its probe
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::ValidationFailed { .. })
    }
}

/// Source registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Invalid source name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the control server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the control server
pub type ServerResult<T> = std::result::Result<T, ServerError>;

impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ServerError::Registry(RegistryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Registry(RegistryError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            ServerError::Engine(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Engine(EngineError::ShutDown) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "status": "error", "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
