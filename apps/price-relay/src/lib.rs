#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Price Relay - Live Price Fan-Out
//!
//! A relay service that maintains a single WebSocket connection to the
//! Binance ticker stream, keeps a bounded rolling history of prices, and
//! fans each update out to multiple downstream WebSocket subscribers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core relay state with no external integrations
//!   - `history`: Bounded rolling buffer of price points
//!   - `subscriber`: Registry of connected downstream subscribers
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket client for the upstream ticker stream
//!   - `broadcast`: Signal-driven fan-out of history snapshots
//!   - `server`: Axum HTTP/WebSocket server for subscribers
//!   - `config`: Environment-based configuration
//!   - `telemetry`: OpenTelemetry + tracing setup
//!   - `metrics`: Prometheus metrics
//!
//! # Data Flow
//!
//! ```text
//!                   ┌─────────────┐     ┌─────────────┐
//! Binance WS ──────►│   History   │────►│  Broadcast  │──► Subscriber 1
//!      │            │   Buffer    │     │    Pass     │──► Subscriber 2
//!      └── signal ──┴─────────────┴────►└─────────────┘──► Subscriber N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Relay state types with no external dependencies.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::history::{
    DEFAULT_HISTORY_CAPACITY, HistoryBuffer, PricePoint, SharedHistory, shared_history,
};
pub use domain::subscriber::{SendError, SubscriberHandle, SubscriberId, SubscriberRegistry};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, FeedSettings, HistorySettings, RelayConfig, ServerSettings,
};

// Upstream feed client
pub use infrastructure::binance::{
    BackoffConfig, BackoffPolicy, ConnectionState, FeedClient, FeedClientError, FeedStatus,
    JsonCodec, TickerMessage,
};

// Broadcast coordinator (for integration tests)
pub use infrastructure::broadcast::{
    Broadcaster, PassOutcome, UpdateSignal, broadcast_pass, signal_channel,
};

// Relay server (for integration tests)
pub use infrastructure::server::{AppState, RelayServer, RelayServerError};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
