//! Reconnection Policy
//!
//! Fixed-delay retry for the upstream WebSocket connection. The delay does
//! not grow between attempts; the upstream is a public stream and a short
//! constant backoff matches how quickly it recovers.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Fixed delay before each reconnection attempt.
    pub delay: Duration,
    /// Maximum number of reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 0, // Unlimited
        }
    }
}

/// Fixed-delay reconnection policy.
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    attempt_count: u32,
}

impl BackoffPolicy {
    /// Create a new policy.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempt_count: 0,
        }
    }

    /// Get the delay before the next attempt.
    ///
    /// Returns `None` if max attempts have been exceeded.
    #[must_use]
    pub const fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempt_count >= self.config.max_attempts {
            return None;
        }
        self.attempt_count += 1;
        Some(self.config.delay)
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt_count = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BackoffConfig::default();
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 0);
    }

    #[test]
    fn delay_is_fixed_across_attempts() {
        let mut policy = BackoffPolicy::new(BackoffConfig {
            delay: Duration::from_millis(250),
            max_attempts: 0,
        });

        for _ in 0..10 {
            assert_eq!(policy.next_delay(), Some(Duration::from_millis(250)));
        }
        assert_eq!(policy.attempt_count(), 10);
    }

    #[test]
    fn max_attempts_exhausts() {
        let mut policy = BackoffPolicy::new(BackoffConfig {
            delay: Duration::from_millis(10),
            max_attempts: 2,
        });

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restores_attempts() {
        let mut policy = BackoffPolicy::new(BackoffConfig {
            delay: Duration::from_millis(10),
            max_attempts: 1,
        });

        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());

        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert!(policy.next_delay().is_some());
    }

    #[test]
    fn unlimited_attempts_never_exhaust() {
        let mut policy = BackoffPolicy::new(BackoffConfig::default());
        for _ in 0..1000 {
            assert!(policy.next_delay().is_some());
        }
    }
}
