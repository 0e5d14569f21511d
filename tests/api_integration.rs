//! Integration tests for the HTTP API
//!
//! Tests endpoints with in-process requests against the router

use escape_core::core::create_router;
use escape_core::types::GameConfig;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::{json, Value};

fn create_test_router() -> Router {
    create_router(GameConfig { seed: Some(11), ..GameConfig::default() })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json)
}

async fn new_session(app: &Router) -> String {
    let (status, json) = send(app, "POST", "/session/new", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

fn centered() -> Value {
    json!({ "detected": true, "point": { "x": 0.5, "y": 0.5 }, "looking": true })
}

/// Health reports version and session count
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], escape_core::VERSION);
    assert_eq!(json["sessions_active"], 0);
}

/// Create a session and read it back
#[tokio::test]
async fn test_create_and_get_session() {
    let app = create_test_router();
    let (status, json) = send(&app, "POST", "/session/new", Some(json!({ "seed": 99 }))).await;
    assert_eq!(status, StatusCode::OK);
    let id = json["session_id"].as_str().unwrap().to_string();
    assert_eq!(json["websocket_url"], format!("/ws/{}", id));
    assert_eq!(json["snapshot"]["phase"], "TRAPPED");

    let (status, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "TRAPPED");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 1);
}

/// Unknown session ids are not found
#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = create_test_router();
    let (status, _) = send(&app, "GET", "/session/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", "/session/nope/retry", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// An inline config that fails validation is refused
#[tokio::test]
async fn test_invalid_config_rejected() {
    let app = create_test_router();
    let body = json!({ "config": { "presence": { "grace_ms": 0.0 } } });
    let (status, json) = send(&app, "POST", "/session/new", Some(body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("grace_ms"));
}

/// Posted frames with a centered face reach ANXIOUS
#[tokio::test]
async fn test_frames_drive_calibration() {
    let app = create_test_router();
    let id = new_session(&app).await;
    let uri = format!("/session/{}/frame", id);

    let mut last = Value::Null;
    for _ in 0..99 {
        let (status, json) = send(&app, "POST", &uri, Some(json!({ "dt_ms": 100.0, "gaze": centered() }))).await;
        assert_eq!(status, StatusCode::OK);
        last = json;
    }
    assert_eq!(last["snapshot"]["phase"], "ANXIOUS");
    let events = last["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "phase_changed" && e["to"] == "ANXIOUS"));
}

/// Negative or oversized frame steps are rejected
#[tokio::test]
async fn test_bad_frame_step_rejected() {
    let app = create_test_router();
    let id = new_session(&app).await;
    let uri = format!("/session/{}/frame", id);
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "dt_ms": -5.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "dt_ms": 5000.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Input unlocks audio; retry and cinematic refuse outside their phase
#[tokio::test]
async fn test_input_and_controls() {
    let app = create_test_router();
    let id = new_session(&app).await;

    let (status, json) = send(&app, "POST", &format!("/session/{}/input", id), Some(json!({ "kind": "key", "key": "Space" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], true);
    // First gesture releases the deferred intro audio
    assert!(json["events"].as_array().unwrap().iter().any(|e| e["type"] == "audio"));

    let (_, json) = send(&app, "POST", &format!("/session/{}/retry", id), None).await;
    assert_eq!(json["accepted"], false);

    let (_, json) = send(&app, "POST", &format!("/session/{}/cinematic", id), None).await;
    assert_eq!(json["accepted"], false);

    let (_, json) = send(&app, "POST", &format!("/session/{}/restart", id), None).await;
    assert_eq!(json["accepted"], true);
    assert_eq!(json["snapshot"]["phase"], "TRAPPED");
}

/// Final message before the run ends is a conflict
#[tokio::test]
async fn test_final_message_before_run_end_conflicts() {
    let app = create_test_router();
    let id = new_session(&app).await;
    let (status, json) = send(&app, "POST", &format!("/session/{}/final", id), Some(json!({ "text": "hello" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("not ended"));
}

/// Deleting a session frees it; a second delete finds nothing
#[tokio::test]
async fn test_delete_session() {
    let app = create_test_router();
    let id = new_session(&app).await;
    let uri = format!("/session/{}", id);

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 0);
}
