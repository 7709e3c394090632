// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! HTTP/WebSocket boundary (§4.5, §6): start/stop/status endpoints, a per-source MJPEG
//! multipart stream, and a periodic status WebSocket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::distributor::LatestFrameCache;
use crate::error::IngestError;
use crate::registry::{AddSourceRequest, SourceManager};

const STREAM_HZ: f64 = 15.0;
const STATUS_WS_INTERVAL_S: u64 = 2;

pub struct AppState {
    pub manager: Arc<SourceManager>,
    pub cache: Arc<LatestFrameCache>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sources/start", post(start_source))
        .route("/sources/{id}/stop", post(stop_source))
        .route("/sources/status", get(get_all_status))
        .route("/sources/{id}/status", get(get_source_status))
        .route("/stream/{id}", get(stream_source))
        .route("/ws/status", get(ws_status))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>, host: &str, port: u16) {
    let router = build_router(state);
    let addr = format!("{host}:{port}");
    info!(%addr, "starting HTTP server");
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "HTTP server error");
            }
        }
        Err(e) => error!(error = %e, %addr, "failed to bind HTTP server"),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartSourceRequest {
    pub source_id: Option<Uuid>,
    pub name: String,
    pub source_type: Option<String>,
    pub uri: String,
    pub target_fps: Option<f64>,
    pub reconnect_attempts: Option<i32>,
    pub reconnect_delay_s: Option<f64>,
    pub timeout_s: Option<f64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub loop_playback: Option<bool>,
}

async fn start_source(State(state): State<Arc<AppState>>, Json(body): Json<StartSourceRequest>) -> Response {
    let source_id = body.source_id.unwrap_or_else(Uuid::new_v4);
    let req = AddSourceRequest {
        source_id,
        name: body.name,
        source_type: body.source_type,
        uri: body.uri,
        target_fps: body.target_fps,
        reconnect_attempts: body.reconnect_attempts,
        reconnect_delay_s: body.reconnect_delay_s,
        timeout_s: body.timeout_s,
        username: body.username,
        password: body.password,
        loop_playback: body.loop_playback,
    };

    match state.manager.add_source(req).await {
        Ok(()) => Json(serde_json::json!({"status": "started", "source_id": source_id.to_string()})).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": e.to_string()}))).into_response(),
    }
}

async fn stop_source(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    if state.manager.remove_source(id).await {
        Json(serde_json::json!({"status": "stopped", "source_id": id.to_string()})).into_response()
    } else {
        let err = IngestError::SourceNotFound { id: id.to_string() };
        (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": err.to_string()}))).into_response()
    }
}

async fn get_all_status(State(state): State<Arc<AppState>>) -> Response {
    let all = state.manager.get_all_status();
    let sources: serde_json::Map<String, serde_json::Value> =
        all.iter().map(|(id, status)| (id.to_string(), status.to_json())).collect();
    Json(serde_json::json!({
        "total": state.manager.source_count(),
        "online": state.manager.online_count(),
        "sources": sources,
    }))
    .into_response()
}

async fn get_source_status(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match state.manager.get_status(id) {
        Some(status) => Json(status.to_json()).into_response(),
        None => {
            let err = IngestError::SourceNotFound { id: id.to_string() };
            (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": err.to_string()}))).into_response()
        }
    }
}

/// `multipart/x-mixed-replace` MJPEG stream. Wakes at a fixed 15Hz cadence regardless of
/// whether a new frame is ready; if no frame exists for the tick, nothing is written. The
/// stream never ends on its own — only on client disconnect or source removal (at which
/// point `cache.get` simply stops returning `Some`).
async fn stream_source(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    if state.manager.get_status(id).is_none() {
        let err = IngestError::SourceNotFound { id: id.to_string() };
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": err.to_string()}))).into_response();
    }

    let cache = state.cache.clone();
    let body = Body::from_stream(async_stream::stream! {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / STREAM_HZ));
        loop {
            ticker.tick().await;
            if let Some(jpeg) = cache.get(id) {
                let mut part = Vec::with_capacity(jpeg.len() + 64);
                part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
                part.extend_from_slice(&jpeg);
                part.extend_from_slice(b"\r\n");
                yield Ok::<_, std::io::Error>(bytes::Bytes::from(part));
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "multipart/x-mixed-replace; boundary=frame")
        .header(header::CACHE_CONTROL, "no-cache, no-store")
        .body(body)
        .unwrap()
        .into_response()
}

async fn ws_status(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_status_socket(socket, state))
}

async fn handle_status_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(STATUS_WS_INTERVAL_S));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let all = state.manager.get_all_status();
                let sources: serde_json::Map<String, serde_json::Value> =
                    all.iter().map(|(id, status)| (id.to_string(), status.to_json())).collect();
                let payload = serde_json::json!({
                    "type": "source_status",
                    "total": state.manager.source_count(),
                    "online": state.manager.online_count(),
                    "sources": sources,
                });
                if socket.send(Message::Text(payload.to_string().into())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ingestion-engine",
        "sources_total": state.manager.source_count(),
        "sources_online": state.manager.online_count(),
    }))
    .into_response()
}
