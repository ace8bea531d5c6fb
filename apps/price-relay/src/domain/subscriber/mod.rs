//! Subscriber Registry
//!
//! Tracks currently connected downstream subscribers. Connection handlers
//! register on connect and unregister on disconnect; the broadcaster reads a
//! snapshot of the registry for each pass and unregisters handles whose
//! sends fail.
//!
//! # Concurrency
//!
//! All mutation goes through one `RwLock`. The broadcaster never iterates
//! the live map: `snapshot()` copies the handles out so a subscriber
//! disconnecting mid-broadcast cannot invalidate the traversal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a downstream subscriber.
///
/// Ids are allocated from a monotonic counter, so a handle is never reused
/// and duplicate registration cannot occur.
pub type SubscriberId = u64;

/// Error returned when a send to a subscriber fails.
///
/// The only failure mode is a closed transport: the connection's writer
/// task has exited because the peer disconnected.
#[derive(Debug, Clone, thiserror::Error)]
#[error("subscriber {id} channel closed")]
pub struct SendError {
    /// Id of the subscriber whose channel closed.
    pub id: SubscriberId,
}

/// Handle to one live downstream connection.
///
/// Wraps the channel feeding the connection's writer task. Cloneable so the
/// broadcaster can traverse a snapshot while the registry keeps its own
/// copy.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<String>,
}

impl SubscriberHandle {
    /// This subscriber's id.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Send a text payload to the subscriber.
    ///
    /// # Errors
    ///
    /// Returns `SendError` if the connection's receiving half is gone.
    pub fn send(&self, text: String) -> Result<(), SendError> {
        self.tx.send(text).map_err(|_| SendError { id: self.id })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Set of currently connected subscribers.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber around its outbound channel.
    ///
    /// Returns the handle, with a freshly allocated id, for the connection
    /// handler to deregister with later.
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> SubscriberHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriberHandle { id, tx };
        self.subscribers.write().insert(id, handle.clone());
        tracing::debug!(subscriber_id = id, "Subscriber registered");
        handle
    }

    /// Deregister a subscriber. Removing an absent id is a no-op.
    pub fn unregister(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(subscriber_id = id, "Subscriber unregistered");
        }
    }

    /// Copy out the current set of handles for a stable traversal.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriberHandle> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether no subscribers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_assigns_unique_ids() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        let a = registry.register(tx1);
        let b = registry.register(tx2);

        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn register_then_unregister_restores_size() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());

        let (tx, _rx) = channel();
        let handle = registry.register(tx);
        assert_eq!(registry.len(), 1);

        registry.unregister(handle.id());
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (tx, _rx) = channel();
        let handle = registry.register(tx);

        registry.unregister(handle.id());
        registry.unregister(handle.id());
        registry.unregister(9999);

        assert!(registry.is_empty());
    }

    #[test]
    fn send_delivers_to_channel() {
        let registry = SubscriberRegistry::new();
        let (tx, mut rx) = channel();
        let handle = registry.register(tx);

        handle.send("[1.0]".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "[1.0]");
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let registry = SubscriberRegistry::new();
        let (tx, rx) = channel();
        let handle = registry.register(tx);

        drop(rx);
        let err = handle.send("[]".to_string()).unwrap_err();
        assert_eq!(err.id, handle.id());
    }

    #[test]
    fn snapshot_is_stable_under_mutation() {
        let registry = SubscriberRegistry::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        let a = registry.register(tx1);
        let _b = registry.register(tx2);

        let snapshot = registry.snapshot();
        registry.unregister(a.id());

        // Traversal view is unaffected by the removal.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
