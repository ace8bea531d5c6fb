//! Price Relay Binary
//!
//! Starts the live price relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin price-relay
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `RELAY_BIND_HOST`: HTTP/WebSocket bind host (default: 0.0.0.0)
//! - `RELAY_BIND_PORT`: HTTP/WebSocket bind port (default: 8000)
//! - `BINANCE_WS_URL`: Upstream WebSocket base URL (default: wss://stream.binance.com:9443/ws)
//! - `RELAY_SYMBOL`: Ticker symbol to relay (default: btcusdt)
//! - `RELAY_HISTORY_CAPACITY`: Price points retained (default: 50)
//! - `RELAY_THROTTLE_MS`: Minimum interval between accepted ticks (default: 1000)
//! - `RELAY_RECONNECT_DELAY_SECS`: Fixed reconnect backoff (default: 3)
//! - `RELAY_MAX_RECONNECT_ATTEMPTS`: Attempt cap, 0 = unlimited (default: 0)
//! - `RELAY_SIGNAL_CAPACITY`: Update-signal channel capacity (default: 64)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `OTEL_SERVICE_NAME`: Service name (default: price-relay)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use price_relay::infrastructure::telemetry;
use price_relay::{
    AppState, Broadcaster, FeedClient, FeedStatus, RelayConfig, RelayServer, SubscriberRegistry,
    init_metrics, shared_history, signal_channel,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting price relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Shared relay state
    let history = shared_history(config.history.capacity);
    let registry = Arc::new(SubscriberRegistry::new());
    let feed_status = Arc::new(FeedStatus::new());
    let (signal_tx, signal_rx) = signal_channel(config.broadcast.signal_capacity);

    // Bind the subscriber-facing server before anything else runs; a port
    // conflict must abort startup, not leave a headless relay.
    let app_state = Arc::new(AppState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&history),
        Arc::clone(&registry),
        Arc::clone(&feed_status),
    ));
    let server = RelayServer::bind(
        &config.server.bind_addr(),
        app_state,
        shutdown_token.clone(),
    )
    .await?;

    // Spawn the broadcast coordinator
    let broadcaster = Broadcaster::new(
        Arc::clone(&history),
        Arc::clone(&registry),
        signal_rx,
        shutdown_token.clone(),
    );
    tokio::spawn(broadcaster.run());

    // Spawn the upstream feed client
    let feed_client = Arc::new(FeedClient::new(
        config.feed.clone(),
        Arc::clone(&history),
        signal_tx,
        Arc::clone(&feed_status),
        shutdown_token.clone(),
    ));
    tokio::spawn(async move {
        if let Err(e) = feed_client.run().await {
            tracing::error!(error = %e, "Feed client error");
        }
    });

    // Spawn the relay server
    tokio::spawn(async move {
        if let Err(e) = server.serve().await {
            tracing::error!(error = %e, "Relay server error");
        }
    });

    tracing::info!("Price relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Price relay stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        bind_addr = %config.server.bind_addr(),
        symbol = %config.feed.symbol,
        history_capacity = config.history.capacity,
        throttle_ms = config.feed.throttle_interval.as_millis(),
        reconnect_delay_secs = config.feed.reconnect_delay.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(stream_url = %config.feed.stream_url(), "Upstream endpoint");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv_from_ancestors() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
