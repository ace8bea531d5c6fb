//! Upstream Feed Client
//!
//! Maintains the single persistent WebSocket connection to the Binance
//! ticker stream. For each accepted tick the client records the price into
//! the shared history buffer, emits one update signal to the broadcaster,
//! then sleeps the throttle interval so broadcast cadence is bounded
//! regardless of upstream tick rate.
//!
//! The connection loop never terminates on its own: any read, parse, or
//! connect error is logged and followed by a fixed backoff before the next
//! attempt. Only cancellation (or an attempt cap, when configured) ends it.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::domain::history::SharedHistory;
use crate::infrastructure::broadcast::UpdateSignal;
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics;

use super::codec::{CodecError, JsonCodec};
use super::reconnect::{BackoffConfig, BackoffPolicy};
use super::status::{ConnectionState, FeedStatus};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error on an inbound frame.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The update-signal channel closed (broadcaster gone).
    #[error("update signal channel closed")]
    ChannelSend,

    /// Connection closed by the server or stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// Maximum reconnection attempts exceeded.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

// =============================================================================
// Feed Client
// =============================================================================

/// Upstream WebSocket client for one ticker channel.
///
/// Owns the connection lifecycle: `Disconnected → Connecting → Streaming`,
/// back to `Disconnected` on any error, with a fixed backoff before each
/// reconnect attempt.
pub struct FeedClient {
    settings: FeedSettings,
    codec: JsonCodec,
    history: SharedHistory,
    signal_tx: mpsc::Sender<UpdateSignal>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub const fn new(
        settings: FeedSettings,
        history: SharedHistory,
        signal_tx: mpsc::Sender<UpdateSignal>,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            codec: JsonCodec::new(),
            history,
            signal_tx,
            status,
            cancel,
        }
    }

    /// Run the feed client connection loop until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `MaxReconnectAttemptsExceeded` only when an attempt cap is
    /// configured and exhausted; with the default unlimited policy the only
    /// exit is cancellation.
    pub async fn run(self: Arc<Self>) -> Result<(), FeedClientError> {
        let mut backoff = BackoffPolicy::new(BackoffConfig {
            delay: self.settings.reconnect_delay,
            max_attempts: self.settings.max_reconnect_attempts,
        });

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Feed client cancelled");
                return Ok(());
            }

            match self.connect_and_stream(&mut backoff).await {
                Ok(()) => {
                    tracing::info!("Feed client stopped");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Upstream connection error");
                    self.status.set_state(ConnectionState::Disconnected);
                    metrics::set_feed_connected(0.0);

                    let Some(delay) = backoff.next_delay() else {
                        return Err(FeedClientError::MaxReconnectAttemptsExceeded);
                    };

                    let attempt = backoff.attempt_count();
                    self.status.set_state(ConnectionState::Reconnecting);
                    self.status.increment_reconnect_attempts();
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting to upstream feed"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Feed client cancelled during backoff");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect and stream ticks until an error or cancellation.
    async fn connect_and_stream(
        &self,
        backoff: &mut BackoffPolicy,
    ) -> Result<(), FeedClientError> {
        let url = self.settings.stream_url();
        self.status.set_state(ConnectionState::Connecting);
        tracing::info!(url = %url, "Connecting to upstream feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&url).await?;

        backoff.reset();
        self.status.set_state(ConnectionState::Streaming);
        metrics::set_feed_connected(1.0);
        tracing::info!(symbol = %self.settings.symbol, "Upstream feed streaming");

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    return Ok(());
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_tick(text.as_ref())?;

                            // Read-driven throttle: bounds both the upstream
                            // read rate and the signal rate at one per
                            // interval.
                            tokio::select! {
                                () = self.cancel.cancelled() => return Ok(()),
                                () = tokio::time::sleep(self.settings.throttle_interval) => {}
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Upstream sent close frame");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Ignore pongs and binary frames
                        }
                        Some(Err(e)) => {
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("Upstream stream ended");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Record one accepted tick and signal the broadcaster.
    fn handle_tick(&self, text: &str) -> Result<(), FeedClientError> {
        let price = self.codec.decode_price(text)?;

        self.history.write().record(price);
        self.status.increment_messages();
        metrics::record_tick();
        tracing::trace!(price, "Recorded price point");

        // try_send rather than awaiting: the lock-free path keeps this
        // function synchronous, and with the throttle in place the bounded
        // channel only fills if the broadcaster has stalled for the whole
        // backlog. A full channel drops the trigger; the next tick re-arms
        // it, so subscribers at worst miss one intermediate snapshot.
        match self.signal_tx.try_send(UpdateSignal) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(UpdateSignal)) => {
                tracing::warn!("Update signal channel full, dropping trigger");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(UpdateSignal)) => {
                Err(FeedClientError::ChannelSend)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::shared_history;

    fn test_client(
        signal_capacity: usize,
    ) -> (Arc<FeedClient>, SharedHistory, mpsc::Receiver<UpdateSignal>) {
        let history = shared_history(3);
        let (signal_tx, signal_rx) = mpsc::channel(signal_capacity);
        let client = Arc::new(FeedClient::new(
            FeedSettings::default(),
            Arc::clone(&history),
            signal_tx,
            Arc::new(FeedStatus::new()),
            CancellationToken::new(),
        ));
        (client, history, signal_rx)
    }

    #[test]
    fn tick_records_and_signals() {
        let (client, history, mut signal_rx) = test_client(4);

        client
            .handle_tick(r#"{"s":"BTCUSDT","c":"50000.0"}"#)
            .unwrap();

        assert_eq!(history.read().snapshot(), vec![50000.0]);
        assert!(signal_rx.try_recv().is_ok());
        assert_eq!(client.status.messages_received(), 1);
    }

    #[test]
    fn malformed_tick_is_an_error_and_records_nothing() {
        let (client, history, mut signal_rx) = test_client(4);

        let result = client.handle_tick("garbage");

        assert!(matches!(result, Err(FeedClientError::Codec(_))));
        assert!(history.read().is_empty());
        assert!(signal_rx.try_recv().is_err());
    }

    #[test]
    fn full_signal_channel_drops_trigger_without_error() {
        let (client, history, _signal_rx) = test_client(1);

        client.handle_tick(r#"{"c":"1.0"}"#).unwrap();
        // Channel now full; the trigger is dropped but the tick still lands.
        client.handle_tick(r#"{"c":"2.0"}"#).unwrap();

        assert_eq!(history.read().snapshot(), vec![1.0, 2.0]);
    }

    #[test]
    fn closed_signal_channel_is_fatal_for_the_connection() {
        let (client, _history, signal_rx) = test_client(1);
        drop(signal_rx);

        let result = client.handle_tick(r#"{"c":"1.0"}"#);
        assert!(matches!(result, Err(FeedClientError::ChannelSend)));
    }

    #[tokio::test]
    async fn run_exits_when_cancelled_before_connect() {
        let history = shared_history(3);
        let (signal_tx, _signal_rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let client = Arc::new(FeedClient::new(
            FeedSettings::default(),
            history,
            signal_tx,
            Arc::new(FeedStatus::new()),
            cancel.clone(),
        ));

        cancel.cancel();
        assert!(client.run().await.is_ok());
    }

    #[tokio::test]
    async fn run_gives_up_after_attempt_cap() {
        // Unroutable port on localhost: every connect fails fast.
        let settings = FeedSettings {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: std::time::Duration::from_millis(10),
            max_reconnect_attempts: 2,
            ..FeedSettings::default()
        };
        let history = shared_history(3);
        let (signal_tx, _signal_rx) = mpsc::channel(4);
        let client = Arc::new(FeedClient::new(
            settings,
            history,
            signal_tx,
            Arc::new(FeedStatus::new()),
            CancellationToken::new(),
        ));

        let result = client.run().await;
        assert!(matches!(
            result,
            Err(FeedClientError::MaxReconnectAttemptsExceeded)
        ));
    }
}
