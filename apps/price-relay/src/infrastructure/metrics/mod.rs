//! Prometheus Metrics Module
//!
//! Exposes relay metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Upstream**: ticks accepted, reconnect attempts, connection gauge
//! - **Broadcast**: passes, deliveries, pruned subscribers
//! - **Subscribers**: active connection gauge
//!
//! # Integration
//!
//! Metrics are exposed at `GET /metrics` on the relay server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "relay_ticks_received_total",
        "Total accepted ticks from the upstream feed"
    );
    describe_counter!(
        "relay_reconnects_total",
        "Total upstream reconnection attempts"
    );
    describe_counter!(
        "relay_broadcasts_total",
        "Total broadcast passes executed"
    );
    describe_counter!(
        "relay_messages_sent_total",
        "Total snapshots delivered to subscribers"
    );
    describe_counter!(
        "relay_subscribers_pruned_total",
        "Total subscribers removed after a failed send"
    );

    describe_gauge!(
        "relay_feed_connected",
        "Whether the upstream feed is connected (1) or not (0)"
    );
    describe_gauge!(
        "relay_subscribers",
        "Number of currently connected subscribers"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one accepted upstream tick.
pub fn record_tick() {
    counter!("relay_ticks_received_total").increment(1);
}

/// Record one upstream reconnection attempt.
pub fn record_reconnect() {
    counter!("relay_reconnects_total").increment(1);
}

/// Record one completed broadcast pass.
pub fn record_broadcast(delivered: u64, pruned: u64) {
    counter!("relay_broadcasts_total").increment(1);
    counter!("relay_messages_sent_total").increment(delivered);
    counter!("relay_subscribers_pruned_total").increment(pruned);
}

/// Update the upstream connection gauge.
pub fn set_feed_connected(connected: f64) {
    gauge!("relay_feed_connected").set(connected);
}

/// Update the active subscriber gauge.
pub fn set_subscribers(count: f64) {
    gauge!("relay_subscribers").set(count);
}

// =============================================================================
// Tests
// =============================================================================
