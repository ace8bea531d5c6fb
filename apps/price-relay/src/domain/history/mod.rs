//! Price History Buffer
//!
//! Bounded, ordered store of the most recent observed prices. The upstream
//! feed client is the sole writer; the broadcaster and connection handlers
//! only ever read copied-out snapshots, so no reader can race a mutation or
//! stall the writer by holding a reference into the buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

/// A single observed price. No identity beyond its position in history.
pub type PricePoint = f64;

/// Shared handle to the history buffer.
///
/// Handed to each component at construction. Locks are only held for the
/// duration of a `record` or `snapshot`, never across a suspension point.
pub type SharedHistory = Arc<RwLock<HistoryBuffer>>;

/// Default number of points retained when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Bounded FIFO buffer of recent prices.
///
/// Insertion is append-then-evict-oldest once capacity is reached. All
/// operations are total; there are no error conditions.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<PricePoint>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create an empty buffer retaining at most `capacity` points.
    ///
    /// A zero capacity is rejected at configuration parse time; this
    /// constructor clamps to 1 so the type itself stays total.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest if the buffer is full.
    ///
    /// O(1) amortized.
    pub fn record(&mut self, point: PricePoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Copy out the current contents in emission order.
    ///
    /// The returned vector is independent of the buffer and safe to
    /// serialize while further points are recorded.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.points.iter().copied().collect()
    }

    /// Whether no points have been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Maximum number of points retained.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Create a shared history buffer with the given capacity.
#[must_use]
pub fn shared_history(capacity: usize) -> SharedHistory {
    Arc::new(RwLock::new(HistoryBuffer::with_capacity(capacity)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer = HistoryBuffer::with_capacity(3);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.capacity(), 3);
        assert!(buffer.snapshot().is_empty());
    }

    #[test]
    fn record_below_capacity() {
        let mut buffer = HistoryBuffer::with_capacity(3);
        buffer.record(100.0);
        buffer.record(101.0);

        assert!(!buffer.is_empty());
        assert_eq!(buffer.snapshot(), vec![100.0, 101.0]);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut buffer = HistoryBuffer::with_capacity(3);
        buffer.record(50000.0);
        buffer.record(50001.0);
        buffer.record(50002.0);
        buffer.record(50003.0);

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.snapshot(), vec![50001.0, 50002.0, 50003.0]);
    }

    #[test]
    fn retains_last_capacity_points_in_order() {
        let mut buffer = HistoryBuffer::with_capacity(5);
        for i in 0..100 {
            buffer.record(f64::from(i));
        }

        assert_eq!(
            buffer.snapshot(),
            vec![95.0, 96.0, 97.0, 98.0, 99.0]
        );
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut buffer = HistoryBuffer::with_capacity(3);
        buffer.record(1.0);

        let snapshot = buffer.snapshot();
        buffer.record(2.0);

        assert_eq!(snapshot, vec![1.0]);
        assert_eq!(buffer.snapshot(), vec![1.0, 2.0]);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut buffer = HistoryBuffer::with_capacity(0);
        buffer.record(1.0);
        buffer.record(2.0);
        assert_eq!(buffer.snapshot(), vec![2.0]);
    }

    #[test]
    fn shared_history_roundtrip() {
        let history = shared_history(2);
        history.write().record(9.5);
        assert_eq!(history.read().snapshot(), vec![9.5]);
    }
}
