//! Relay HTTP/WebSocket Server
//!
//! Single axum server carrying both the subscriber-facing WebSocket endpoint
//! and the operational endpoints.
//!
//! # Endpoints
//!
//! - `GET /ws/btc-price` - WebSocket stream of history snapshots
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks the upstream feed)
//! - `GET /metrics` - Prometheus metrics in text format
//!
//! # Connection Lifecycle
//!
//! Each accepted WebSocket goes through: send the current history snapshot
//! (skipped while the history is empty), register in the subscriber
//! registry, then park on the socket until the peer disconnects. A writer
//! task forwards broadcast payloads from the subscriber channel to the
//! socket; the handler deregisters the subscriber on every exit path.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::history::SharedHistory;
use crate::domain::subscriber::SubscriberRegistry;
use crate::infrastructure::binance::FeedStatus;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Upstream feed status.
    pub feed: FeedInfo,
    /// Active subscriber count.
    pub subscribers: usize,
    /// Number of price points currently buffered.
    pub history_len: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Upstream feed streaming.
    Healthy,
    /// Upstream feed down but it has streamed before.
    Degraded,
    /// Upstream feed has never streamed.
    Unhealthy,
}

/// Upstream feed status for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: String,
    /// Whether the feed is streaming.
    pub connected: bool,
    /// Accepted upstream messages.
    pub messages_received: u64,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u32,
    /// When the feed last reached the streaming state.
    pub last_connected_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for all request handlers.
pub struct AppState {
    version: String,
    started_at: Instant,
    history: SharedHistory,
    registry: Arc<SubscriberRegistry>,
    feed_status: Arc<FeedStatus>,
}

impl AppState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        history: SharedHistory,
        registry: Arc<SubscriberRegistry>,
        feed_status: Arc<FeedStatus>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            history,
            registry,
            feed_status,
        }
    }
}

// =============================================================================
// Relay Server
// =============================================================================

/// HTTP/WebSocket server for downstream subscribers.
pub struct RelayServer {
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl RelayServer {
    /// Bind the listener.
    ///
    /// Binding is separated from serving so a bind failure aborts startup
    /// before the feed client and broadcaster are spawned.
    ///
    /// # Errors
    ///
    /// Returns `RelayServerError::BindFailed` if the address is unavailable.
    pub async fn bind(
        addr: &str,
        state: Arc<AppState>,
        cancel: CancellationToken,
    ) -> Result<Self, RelayServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayServerError::BindFailed(addr.to_string(), e.to_string()))?;

        Ok(Self {
            listener,
            state,
            cancel,
        })
    }

    /// The address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns `RelayServerError::ServerFailed` if the local address cannot
    /// be read back from the socket.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, RelayServerError> {
        self.listener
            .local_addr()
            .map_err(|e| RelayServerError::ServerFailed(e.to_string()))
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RelayServerError::ServerFailed` on a fatal accept-loop error.
    pub async fn serve(self) -> Result<(), RelayServerError> {
        let addr = self.local_addr()?;

        let app = Router::new()
            .route("/ws/btc-price", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        tracing::info!(addr = %addr, "Relay server listening");

        axum::serve(self.listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| RelayServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Relay server stopped");
        Ok(())
    }
}

// =============================================================================
// WebSocket Handler
// =============================================================================

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one subscriber connection from accept to disconnect.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Initial snapshot goes down the same channel before registration, so
    // it is on the wire ahead of any broadcast payload and an empty history
    // sends nothing.
    {
        let snapshot = state.history.read().snapshot();
        if !snapshot.is_empty() {
            match serde_json::to_string(&snapshot) {
                Ok(payload) => {
                    // Receiver is still in scope; this cannot fail.
                    let _ = tx.send(payload);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize initial snapshot");
                }
            }
        }
    }

    let handle = state.registry.register(tx);
    let subscriber_id = handle.id();
    crate::infrastructure::metrics::set_subscribers(state.registry.len() as f64);
    tracing::info!(subscriber_id, "Subscriber connected");

    // Writer task: forwards broadcast payloads to the socket. Exits when the
    // channel closes (deregistration) or the socket rejects a write.
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: the subscriber protocol is one-way, so inbound frames are
    // drained and ignored until the peer goes away. axum answers pings
    // itself.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.registry.unregister(subscriber_id);
    writer.abort();
    crate::infrastructure::metrics::set_subscribers(state.registry.len() as f64);
    tracing::info!(subscriber_id, "Subscriber disconnected");
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Ready once the feed has streamed at least once; a reconnect gap does
    // not flip readiness because buffered history is still served.
    let is_ready =
        state.feed_status.is_streaming() || state.feed_status.last_connected_at().is_some();

    if is_ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let feed = FeedInfo {
        state: state.feed_status.state().as_str().to_string(),
        connected: state.feed_status.is_streaming(),
        messages_received: state.feed_status.messages_received(),
        reconnect_attempts: state.feed_status.reconnect_attempts(),
        last_connected_at: state.feed_status.last_connected_at(),
    };

    let status = if feed.connected {
        HealthStatus::Healthy
    } else if feed.last_connected_at.is_some() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        subscribers: state.registry.len(),
        history_len: state.history.read().len(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind the listen address.
    #[error("failed to bind {0}: {1}")]
    BindFailed(String, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
