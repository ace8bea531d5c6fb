//! Feed Status
//!
//! Connection state and counters for the upstream feed, shared between the
//! feed client (writer) and the health endpoint (reader).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Upstream connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and receiving ticks.
    Streaming,
    /// Waiting out the backoff delay before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Get the state name for health reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// Shared status of the upstream feed.
#[derive(Debug, Default)]
pub struct FeedStatus {
    state: RwLock<ConnectionState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    messages_received: AtomicU64,
    reconnect_attempts: AtomicU32,
}

impl FeedStatus {
    /// Create status in the disconnected state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state.
    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Streaming {
            *self.last_connected_at.write() = Some(Utc::now());
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the feed is currently streaming.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state() == ConnectionState::Streaming
    }

    /// When the feed last reached the streaming state, if ever.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Record one accepted upstream message.
    pub fn increment_messages(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Total accepted upstream messages.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Record one reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Reconnect attempts since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }
}
