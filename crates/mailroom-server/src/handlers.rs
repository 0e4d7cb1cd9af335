//! HTTP and WebSocket gateways.
//!
//! Two routes matter: `GET /room/{id}/connect` upgrades a viewer to a live
//! session, and `POST /webhook/room/{id}` lands messages pushed by the
//! email ingestion pipeline. Both resolve the room through the directory
//! and hand off to its actor; neither holds any room state of its own.

use crate::config::{Config, StorageBackend};
use crate::metrics::{self, SessionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use mailroom_core::{RoomDirectory, RoomHandle, Session};
use mailroom_storage::{DurableLog, FileLog, MemoryLog};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The room directory.
    pub directory: RoomDirectory,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state over the given storage backend.
    #[must_use]
    pub fn new(config: Config, storage: Arc<dyn DurableLog>) -> Self {
        Self {
            directory: RoomDirectory::new(storage, config.room_config()),
            config,
        }
    }
}

/// Build the storage backend selected by the configuration.
pub fn build_storage(config: &Config) -> Arc<dyn DurableLog> {
    match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryLog::new()),
        StorageBackend::File => Arc::new(FileLog::new(config.storage.path.clone())),
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let storage = build_storage(&config);
    let state = Arc::new(AppState::new(config.clone(), storage));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = router(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Mailroom listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/room/{{id}}/connect", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/room/:id/connect", get(connect_handler))
        .route("/webhook/room/:id", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler for `GET /room/{id}/connect`.
///
/// Requests without a WebSocket upgrade are turned away with `400` before
/// any session exists.
async fn connect_handler(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(room = %id, error = %rejection, "Rejected non-upgrade connect request");
            return (StatusCode::BAD_REQUEST, "Expected WebSocket").into_response();
        }
    };

    let room = state.directory.resolve(&id);
    metrics::set_active_rooms(state.directory.room_count());

    ws.on_upgrade(move |socket| handle_socket(socket, room, id))
        .into_response()
}

/// Pump one upgraded WebSocket connection.
///
/// Registration with the actor happens after the protocol switch, so the
/// history replay (sent by the actor through the session's outbound
/// channel) never delays the handshake. The viewer protocol is one-way:
/// inbound text frames are ignored, Pings are answered, Close or error ends
/// the session.
async fn handle_socket(socket: WebSocket, room: RoomHandle, room_id: String) {
    let _guard = SessionMetricsGuard::new();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let session = Session::new(outbound_tx);
    let session_id = session.id().clone();

    debug!(room = %room_id, session = %session_id, "WebSocket connected");

    if room.connect(session).await.is_err() {
        warn!(room = %room_id, session = %session_id, "Room actor gone before registration");
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Frames queued by the room actor (history, then live messages)
            frame = outbound_rx.recv() => {
                match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Inbound socket traffic
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(room = %room_id, session = %session_id, "Received close frame");
                        break;
                    }
                    Some(Ok(_)) => {
                        // One-way protocol; viewers have nothing to say
                    }
                    Some(Err(e)) => {
                        warn!(room = %room_id, session = %session_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(room = %room_id, session = %session_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Dropping the outbound receiver makes any later actor send fail, but
    // tell the actor directly rather than wait for that.
    let _ = room.disconnect(session_id.clone()).await;

    debug!(room = %room_id, session = %session_id, "WebSocket disconnected");
}

/// Webhook handler for `POST /webhook/room/{id}`.
///
/// The landing point for at-least-once delivery from the ingestion
/// pipeline: a non-2xx response means the caller should retry, and no
/// deduplication happens here.
async fn webhook_handler(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            debug!(room = %id, error = %e, "Rejected webhook payload");
            metrics::record_error("payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "Invalid payload"})),
            )
                .into_response();
        }
    };

    let room = state.directory.resolve(&id);
    metrics::set_active_rooms(state.directory.room_count());

    match room.ingest(payload).await {
        Ok(delivered) => {
            metrics::record_ingest(body.len());
            debug!(room = %id, recipients = delivered, "Webhook ingested");
            Json(serde_json::json!({"success": true})).into_response()
        }
        Err(e) => {
            error!(room = %id, error = %e, "Ingest failed");
            metrics::record_error("ingest");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to store message"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_state() -> (Arc<AppState>, Arc<MemoryLog>) {
        let storage = Arc::new(MemoryLog::new());
        let state = Arc::new(AppState::new(
            Config::default(),
            Arc::clone(&storage) as Arc<dyn DurableLog>,
        ));
        (state, storage)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_accepts_json() {
        let (state, storage) = test_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/room/inbox-1")
                    .body(Body::from(r#"{"subject": "hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"success": true}));

        let stored = storage.get("messages:inbox-1").await.unwrap();
        assert_eq!(stored, vec![json!({"subject": "hello"})]);
    }

    #[tokio::test]
    async fn test_webhook_rejects_invalid_json() {
        let (state, storage) = test_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/room/inbox-1")
                    .body(Body::from("not json at all"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "Invalid payload"}));

        // Nothing was mutated
        assert!(storage.get("messages:inbox-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_rooms_are_isolated() {
        let (state, storage) = test_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/room/a")
                    .body(Body::from(r#"{"for": "a"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(storage.get("messages:a").await.unwrap().len(), 1);
        assert!(storage.get("messages:b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_requires_upgrade() {
        let (state, _storage) = test_state();
        let app = router(state);

        // Plain GET, no Upgrade header
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/room/inbox-1/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _storage) = test_state();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
