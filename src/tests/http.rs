//! HTTP control surface tests

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use crate::engine::StreamEngine;
use crate::http::create_router;
use crate::http::sources::{SwitchResponse, SwitchStatus};
use crate::registry::SourceRegistry;
use crate::state::AppState;
use crate::tests::fixtures::server_config;

async fn app(dir: &TempDir) -> (Router, Arc<AppState>) {
    let config = server_config(dir.path());
    let registry = SourceRegistry::open(&config.registry_path).unwrap();
    registry.add("audio1", "radio.mp3").unwrap();
    registry.add("live", "http://stream.example/live").unwrap();
    registry.add("broken", "bad://nowhere").unwrap();

    let default = AppState::default_locator(&config, &registry);
    let engine = StreamEngine::start(config.engine.clone(), default.as_deref())
        .await
        .unwrap();
    let state = Arc::new(AppState::new(engine, registry, config));
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn switch(app: &Router, body: Value) -> (StatusCode, SwitchResponse) {
    let (status, bytes) = send(app, Method::POST, "/switch", Some(body)).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_and_version() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(&dir).await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = send(&app, Method::GET, "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

    state.engine.shutdown().await;
}

#[tokio::test]
async fn test_source_registration_lifecycle() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(&dir).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/sources",
        Some(serde_json::json!({ "name": "mic", "locator": "hw:CARD=CODEC" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/sources", None).await;
    assert_eq!(status, StatusCode::OK);
    let sources: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(sources["mic"], "hw:CARD=CODEC");
    assert_eq!(sources["audio1"], "radio.mp3");

    let (status, _) = send(&app, Method::DELETE, "/sources/mic", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, "/sources/mic", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/sources",
        Some(serde_json::json!({ "name": "", "locator": "x.mp3" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    state.engine.shutdown().await;
}

#[tokio::test]
async fn test_switch_by_name() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(&dir).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/switch",
        Some(serde_json::json!({ "name": "audio1", "immediate": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["from"], Value::Null);

    let (status, reply) = switch(&app, serde_json::json!({ "name": "audio1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.status, SwitchStatus::AlreadyActive);
    assert_eq!(reply.from.as_deref(), Some("audio1"));

    let (status, reply) = switch(
        &app,
        serde_json::json!({ "name": "live", "crossfade_secs": 0.2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.status, SwitchStatus::Switching);
    assert_eq!(reply.from.as_deref(), Some("audio1"));
    assert_eq!(reply.to, "live");

    let (status, body) = send(&app, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["active_source"], "live");
    assert_eq!(json["active_locator"], "http://stream.example/live");
    assert_eq!(json["source_count"], 3);

    state.engine.shutdown().await;
}

#[tokio::test]
async fn test_switch_failures() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(&dir).await;
    switch(&app, serde_json::json!({ "name": "audio1", "immediate": true })).await;

    let (status, reply) = switch(&app, serde_json::json!({ "name": "nope" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(reply.status, SwitchStatus::Invalid);

    let (status, reply) = switch(&app, serde_json::json!({ "name": "broken", "immediate": true })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.status, SwitchStatus::Invalid);
    assert!(reply.error.is_some());

    let (status, reply) = switch(&app, serde_json::json!({ "name": "broken" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.status, SwitchStatus::Failed);

    assert_eq!(state.engine.status().active_locator.as_deref(), Some("radio.mp3"));

    state.engine.shutdown().await;
    let (status, reply) = switch(&app, serde_json::json!({ "name": "live" })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.status, SwitchStatus::Failed);
}

#[tokio::test]
async fn test_reset_and_logs() {
    let dir = TempDir::new().unwrap();
    let (app, state) = app(&dir).await;

    let (status, body) = send(&app, Method::POST, "/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["resets"], 1);

    let (status, body) = send(&app, Method::GET, "/logs?lines=5", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.lines().count() <= 5);
    assert!(text.contains("==="));

    state.engine.shutdown().await;
    let (status, _) = send(&app, Method::POST, "/reset", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
