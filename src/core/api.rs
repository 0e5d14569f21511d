//! HTTP + WebSocket API for escape sessions
//!
//! The browser shell owns the camera and the display loop; it posts one
//! frame at a time and renders the snapshot that comes back.
//!
//! Endpoints:
//! - POST /session/new - Create new session
//! - GET /session/{id} - Get session snapshot
//! - DELETE /session/{id} - Drop a session and close its event stream
//! - POST /session/{id}/frame - Feed samples and advance one frame
//! - POST /session/{id}/input - Key or pointer press
//! - POST /session/{id}/retry - Retry after failure
//! - POST /session/{id}/restart - Start over
//! - POST /session/{id}/cinematic - Awakening cinematic finished
//! - POST /session/{id}/final - Submit the closing message
//! - WS /ws/{id} - Live events
//! - GET /health - Health check

use axum::{
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::core::Session;
use crate::types::{GameConfig, GameEvent, Input, SessionSnapshot, TrackingSample};

/// Events buffered per WebSocket subscriber
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Longest frame step a client may post
const MAX_FRAME_MS: f64 = 1000.0;

/// A hosted session
#[derive(Debug)]
pub struct HostedSession {
    pub id: String,
    pub session: Session,
    pub update_tx: broadcast::Sender<GameEvent>,
}

impl HostedSession {
    /// Drain the session's events and fan them out to WebSocket subscribers
    fn publish(&mut self) -> Vec<GameEvent> {
        let events = self.session.drain_events();
        for event in &events {
            // No subscribers is fine
            let _ = self.update_tx.send(event.clone());
        }
        events
    }
}

/// App state
pub struct AppState {
    pub sessions: Mutex<HashMap<String, HostedSession>>,
    pub config: GameConfig,
}

/// Create new session request
#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    pub config: Option<GameConfig>,
    pub seed: Option<u64>,
}

/// Create new session response
#[derive(Debug, Serialize, Deserialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub snapshot: SessionSnapshot,
}

/// One frame of input from the client
#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub dt_ms: f64,
    pub gaze: Option<TrackingSample>,
    pub hand: Option<TrackingSample>,
}

/// State after a mutation plus the events it produced
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub accepted: bool,
    pub snapshot: SessionSnapshot,
    pub events: Vec<GameEvent>,
}

/// Final message request
#[derive(Debug, Deserialize)]
pub struct FinalMessageRequest {
    pub text: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router(config: GameConfig) -> Router {
    let state = Arc::new(AppState {
        sessions: Mutex::new(HashMap::new()),
        config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/frame", post(post_frame))
        .route("/session/:id/input", post(post_input))
        .route("/session/:id/retry", post(post_retry))
        .route("/session/:id/restart", post(post_restart))
        .route("/session/:id/cinematic", post(post_cinematic))
        .route("/session/:id/final", post(post_final))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut config = req.config.unwrap_or_else(|| state.config.clone());
    if req.seed.is_some() {
        config.seed = req.seed;
    }
    let session = Session::new(config).map_err(|e| error(StatusCode::UNPROCESSABLE_ENTITY, e))?;
    let session_id = generate_session_id();
    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let snapshot = session.snapshot();

    let mut sessions = state.sessions.lock().await;
    sessions.insert(
        session_id.clone(),
        HostedSession { id: session_id.clone(), session, update_tx: tx },
    );
    info!(session = %session_id, "session created");

    Ok(Json(NewSessionResponse {
        session_id: session_id.clone(),
        websocket_url: format!("/ws/{}", session_id),
        snapshot,
    }))
}

/// Get session snapshot
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, StatusCode> {
    let sessions = state.sessions.lock().await;
    let hosted = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(hosted.session.snapshot()))
}

/// Drop a session; its broadcast sender goes with it, closing live sockets
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    let mut sessions = state.sessions.lock().await;
    match sessions.remove(&id) {
        Some(hosted) => {
            info!(session = %hosted.id, phase = %hosted.session.phase(), "session removed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// Run `f` against a session and report what changed
async fn mutate(
    state: &AppState,
    id: &str,
    f: impl FnOnce(&mut Session) -> bool,
) -> Result<Json<UpdateResponse>, StatusCode> {
    let mut sessions = state.sessions.lock().await;
    let hosted = sessions.get_mut(id).ok_or(StatusCode::NOT_FOUND)?;
    let accepted = f(&mut hosted.session);
    let events = hosted.publish();
    Ok(Json(UpdateResponse { accepted, snapshot: hosted.session.snapshot(), events }))
}

/// Feed samples and advance one frame
async fn post_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FrameRequest>,
) -> Result<Json<UpdateResponse>, StatusCode> {
    if !req.dt_ms.is_finite() || req.dt_ms < 0.0 || req.dt_ms > MAX_FRAME_MS {
        debug!(dt_ms = req.dt_ms, "frame rejected");
        return Err(StatusCode::BAD_REQUEST);
    }
    mutate(&state, &id, |session| {
        if let Some(gaze) = req.gaze {
            session.push_gaze(gaze);
        }
        if let Some(hand) = req.hand {
            session.push_hand(hand);
        }
        session.advance(req.dt_ms);
        true
    })
    .await
}

/// Key or pointer press
async fn post_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<Input>,
) -> Result<Json<UpdateResponse>, StatusCode> {
    mutate(&state, &id, |session| {
        session.input(input);
        true
    })
    .await
}

/// Retry after failure
async fn post_retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResponse>, StatusCode> {
    mutate(&state, &id, Session::retry).await
}

/// Start over
async fn post_restart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResponse>, StatusCode> {
    mutate(&state, &id, Session::restart).await
}

/// Awakening cinematic finished
async fn post_cinematic(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResponse>, StatusCode> {
    mutate(&state, &id, Session::cinematic_ended).await
}

/// Submit the closing message
async fn post_final(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FinalMessageRequest>,
) -> Result<Json<UpdateResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut sessions = state.sessions.lock().await;
    let hosted = sessions
        .get_mut(&id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "session not found"))?;
    hosted
        .session
        .submit_final_message(&req.text)
        .map_err(|e| error(StatusCode::CONFLICT, e))?;
    let events = hosted.publish();
    Ok(Json(UpdateResponse { accepted: true, snapshot: hosted.session.snapshot(), events }))
}

/// WebSocket handler for live events
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let sessions = state.sessions.lock().await;
    let hosted = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = hosted.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx, id).await;
    }))
}

/// Forward events until either side goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<GameEvent>, id: String) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "event not serializable");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(session = %id, skipped, "websocket subscriber lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(session = %id, "websocket closed");
}

fn error(status: StatusCode, e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: e.to_string() }))
}

/// Generate session ID
fn generate_session_id() -> String {
    format!("session_{:016x}", rand::random::<u64>())
}

/// Run the API server
pub async fn run_server(addr: &str, config: GameConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let router = create_router(config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    println!("Escape API running on {}", addr);
    println!("  POST /session/new           - Create session");
    println!("  GET  /session/:id           - Get snapshot");
    println!("  DELETE /session/:id         - Drop session");
    println!("  POST /session/:id/frame     - Advance one frame");
    println!("  POST /session/:id/input     - Key or pointer press");
    println!("  POST /session/:id/retry     - Retry after failure");
    println!("  POST /session/:id/restart   - Start over");
    println!("  POST /session/:id/cinematic - Cinematic finished");
    println!("  POST /session/:id/final     - Submit final message");
    println!("  WS   /ws/:id                - Live events");
    println!("  GET  /health                - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
