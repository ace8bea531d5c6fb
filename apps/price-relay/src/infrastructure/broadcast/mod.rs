//! Broadcast Coordinator
//!
//! Sole consumer of the update-signal channel. Each signal triggers one
//! broadcast pass: snapshot the history, serialize it once, send the
//! payload to every registered subscriber, then prune the subscribers whose
//! sends failed. Passes never interleave because this loop is the only
//! consumer; each subscriber therefore sees snapshots in emission order.
//!
//! Failed sends are collected during the traversal and applied to the
//! registry only after it completes, so a subscriber disconnecting
//! mid-broadcast can never corrupt the iteration.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::history::SharedHistory;
use crate::domain::subscriber::SubscriberRegistry;
use crate::infrastructure::metrics;

// =============================================================================
// Update Signal
// =============================================================================

/// Trigger token flowing from the feed client to the broadcaster.
///
/// Carries no payload: the broadcaster snapshots the history itself, so a
/// queued signal can never deliver a stale view.
#[derive(Debug, Clone, Copy)]
pub struct UpdateSignal;

/// Create the bounded single-producer single-consumer signal channel.
#[must_use]
pub fn signal_channel(
    capacity: usize,
) -> (mpsc::Sender<UpdateSignal>, mpsc::Receiver<UpdateSignal>) {
    mpsc::channel(capacity)
}

// =============================================================================
// Broadcast Pass Outcome
// =============================================================================

/// Result of one broadcast pass, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Subscribers the payload was delivered to.
    pub delivered: usize,
    /// Subscribers removed because their send failed.
    pub pruned: usize,
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Consumes update signals and fans history snapshots out to subscribers.
pub struct Broadcaster {
    history: SharedHistory,
    registry: Arc<SubscriberRegistry>,
    signal_rx: mpsc::Receiver<UpdateSignal>,
    cancel: CancellationToken,
}

impl Broadcaster {
    /// Create a new broadcaster.
    #[must_use]
    pub const fn new(
        history: SharedHistory,
        registry: Arc<SubscriberRegistry>,
        signal_rx: mpsc::Receiver<UpdateSignal>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            history,
            registry,
            signal_rx,
            cancel,
        }
    }

    /// Run the broadcast loop until cancelled or the producer side closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Broadcaster cancelled");
                    return;
                }
                signal = self.signal_rx.recv() => {
                    match signal {
                        Some(UpdateSignal) => {
                            let outcome = broadcast_pass(&self.history, &self.registry);
                            tracing::trace!(
                                delivered = outcome.delivered,
                                pruned = outcome.pruned,
                                "Broadcast pass complete"
                            );
                        }
                        None => {
                            tracing::info!("Signal channel closed, broadcaster stopping");
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Execute one broadcast pass.
///
/// Serializes the current history snapshot once, attempts delivery to a
/// stable snapshot of the registry, and unregisters every subscriber whose
/// send failed after the traversal completes. A pass with zero subscribers
/// is a successful no-op.
pub fn broadcast_pass(history: &SharedHistory, registry: &SubscriberRegistry) -> PassOutcome {
    let snapshot = history.read().snapshot();

    let payload = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize history snapshot");
            return PassOutcome::default();
        }
    };

    let subscribers = registry.snapshot();
    let mut failed = Vec::new();
    let mut delivered = 0usize;

    for handle in &subscribers {
        match handle.send(payload.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!(subscriber_id = e.id, "Send failed, pruning subscriber");
                failed.push(e.id);
            }
        }
    }

    let pruned = failed.len();
    for id in failed {
        registry.unregister(id);
    }

    metrics::record_broadcast(delivered as u64, pruned as u64);
    metrics::set_subscribers(registry.len() as f64);

    PassOutcome { delivered, pruned }
}

// =============================================================================
// Tests
// =============================================================================
