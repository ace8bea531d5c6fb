//! WebSocket Streaming Integration Tests
//!
//! Runs the relay server on an ephemeral port and drives it with a real
//! WebSocket client: initial snapshot on connect, broadcast delivery, and
//! registry cleanup on disconnect.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use price_relay::{
    AppState, FeedStatus, RelayServer, SharedHistory, SubscriberRegistry, broadcast_pass,
    shared_history,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct TestRelay {
    addr: SocketAddr,
    history: SharedHistory,
    registry: Arc<SubscriberRegistry>,
    cancel: CancellationToken,
    server_handle: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    fn ws_url(&self) -> String {
        format!("ws://{}/ws/btc-price", self.addr)
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        self.server_handle.await.unwrap();
    }
}

async fn start_relay(history: SharedHistory) -> TestRelay {
    let registry = Arc::new(SubscriberRegistry::new());
    let cancel = CancellationToken::new();

    let state = Arc::new(AppState::new(
        "test-0.0.1".to_string(),
        Arc::clone(&history),
        Arc::clone(&registry),
        Arc::new(FeedStatus::new()),
    ));

    let server = RelayServer::bind("127.0.0.1:0", state, cancel.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let server_handle = tokio::spawn(async move {
        server.serve().await.unwrap();
    });

    TestRelay {
        addr,
        history,
        registry,
        cancel,
        server_handle,
    }
}

/// Poll the registry until it reaches the expected size.
async fn wait_for_subscribers(registry: &SubscriberRegistry, expected: usize) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while registry.len() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "registry never reached {expected} subscribers"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Initial Snapshot
// =============================================================================

#[tokio::test]
async fn connect_receives_current_history_first() {
    let history = shared_history(50);
    history.write().record(100.0);
    history.write().record(101.0);

    let relay = start_relay(history).await;

    let (mut ws, _response) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();

    let msg = timeout(RECV_TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
    match msg {
        Message::Text(text) => assert_eq!(text.as_str(), "[100.0,101.0]"),
        other => panic!("expected text frame, got {other:?}"),
    }

    // Graceful shutdown waits for open connections.
    ws.close(None).await.unwrap();
    relay.shutdown().await;
}

#[tokio::test]
async fn connect_with_empty_history_sends_nothing_until_broadcast() {
    let relay = start_relay(shared_history(50)).await;

    let (mut ws, _response) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    wait_for_subscribers(&relay.registry, 1).await;

    // First frame arrives only once a broadcast pass runs.
    relay.history.write().record(42.0);
    broadcast_pass(&relay.history, &relay.registry);

    let msg = timeout(RECV_TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
    match msg {
        Message::Text(text) => assert_eq!(text.as_str(), "[42.0]"),
        other => panic!("expected text frame, got {other:?}"),
    }

    ws.close(None).await.unwrap();
    relay.shutdown().await;
}

// =============================================================================
// Broadcast Delivery
// =============================================================================

#[tokio::test]
async fn broadcasts_reach_every_connected_client() {
    let history = shared_history(50);
    history.write().record(1.0);

    let relay = start_relay(history).await;

    let (mut ws_a, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    let (mut ws_b, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    wait_for_subscribers(&relay.registry, 2).await;

    // Drain the initial snapshots.
    let _ = timeout(RECV_TIMEOUT, ws_a.next()).await.unwrap().unwrap().unwrap();
    let _ = timeout(RECV_TIMEOUT, ws_b.next()).await.unwrap().unwrap().unwrap();

    relay.history.write().record(2.0);
    let outcome = broadcast_pass(&relay.history, &relay.registry);
    assert_eq!(outcome.delivered, 2);

    for ws in [&mut ws_a, &mut ws_b] {
        let msg = timeout(RECV_TIMEOUT, ws.next()).await.unwrap().unwrap().unwrap();
        match msg {
            Message::Text(text) => assert_eq!(text.as_str(), "[1.0,2.0]"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    ws_a.close(None).await.unwrap();
    ws_b.close(None).await.unwrap();
    relay.shutdown().await;
}

// =============================================================================
// Disconnect Cleanup
// =============================================================================

#[tokio::test]
async fn close_deregisters_the_subscriber() {
    let relay = start_relay(shared_history(50)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    wait_for_subscribers(&relay.registry, 1).await;

    ws.close(None).await.unwrap();
    wait_for_subscribers(&relay.registry, 0).await;

    relay.shutdown().await;
}

#[tokio::test]
async fn abrupt_drop_deregisters_the_subscriber() {
    let relay = start_relay(shared_history(50)).await;

    let (ws, _) = tokio_tungstenite::connect_async(relay.ws_url()).await.unwrap();
    wait_for_subscribers(&relay.registry, 1).await;

    // No close handshake: the TCP connection just goes away.
    drop(ws);
    wait_for_subscribers(&relay.registry, 0).await;

    relay.shutdown().await;
}
