//! Infrastructure layer - Adapters and external integrations.

/// Upstream Binance WebSocket feed client.
pub mod binance;

/// Broadcast coordinator and update signal channel.
pub mod broadcast;

/// Configuration loaded from environment variables.
pub mod config;

/// Prometheus metrics.
pub mod metrics;

/// Downstream HTTP/WebSocket server.
pub mod server;

/// Tracing and OpenTelemetry integration.
pub mod telemetry;
