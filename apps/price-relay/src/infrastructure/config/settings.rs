//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! Every knob has a default matching the minimal deployment: Binance
//! `btcusdt` ticker upstream, port 8000 downstream, 50-point history,
//! 1-second broadcast throttle, 3-second reconnect backoff.

use std::time::Duration;

/// Default upstream WebSocket base URL.
const DEFAULT_UPSTREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// Server bind settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind host for the HTTP/WebSocket server.
    pub host: String,
    /// Bind port for the HTTP/WebSocket server.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerSettings {
    /// Bind address in `host:port` form.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Base WebSocket URL of the upstream exchange.
    pub url: String,
    /// Symbol whose ticker channel is subscribed (lowercase).
    pub symbol: String,
    /// Minimum interval between accepted ticks / emitted update signals.
    pub throttle_interval: Duration,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Maximum reconnect attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            symbol: "btcusdt".to_string(),
            throttle_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 0, // Unlimited
        }
    }
}

impl FeedSettings {
    /// Full stream URL for the configured symbol's ticker channel.
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!("{}/{}@ticker", self.url, self.symbol)
    }
}

/// History buffer settings.
#[derive(Debug, Clone)]
pub struct HistorySettings {
    /// Maximum number of price points retained.
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

/// Broadcast coordinator settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Capacity of the update-signal channel between feed client and
    /// broadcaster.
    pub signal_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            signal_capacity: 64,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Server bind settings.
    pub server: ServerSettings,
    /// Upstream feed settings.
    pub feed: FeedSettings,
    /// History buffer settings.
    pub history: HistorySettings,
    /// Broadcast settings.
    pub broadcast: BroadcastSettings,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; set-but-unparseable numeric
    /// values also fall back. Zero capacities are rejected because they
    /// would make the relay silently useless.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a configured value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerSettings {
            host: std::env::var("RELAY_BIND_HOST")
                .unwrap_or_else(|_| ServerSettings::default().host),
            port: parse_env_u16("RELAY_BIND_PORT", ServerSettings::default().port),
        };

        let feed = FeedSettings {
            url: std::env::var("BINANCE_WS_URL")
                .unwrap_or_else(|_| FeedSettings::default().url),
            symbol: std::env::var("RELAY_SYMBOL")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|_| FeedSettings::default().symbol),
            throttle_interval: parse_env_duration_millis(
                "RELAY_THROTTLE_MS",
                FeedSettings::default().throttle_interval,
            ),
            reconnect_delay: parse_env_duration_secs(
                "RELAY_RECONNECT_DELAY_SECS",
                FeedSettings::default().reconnect_delay,
            ),
            max_reconnect_attempts: parse_env_u32(
                "RELAY_MAX_RECONNECT_ATTEMPTS",
                FeedSettings::default().max_reconnect_attempts,
            ),
        };

        let history = HistorySettings {
            capacity: parse_env_usize(
                "RELAY_HISTORY_CAPACITY",
                HistorySettings::default().capacity,
            ),
        };

        let broadcast = BroadcastSettings {
            signal_capacity: parse_env_usize(
                "RELAY_SIGNAL_CAPACITY",
                BroadcastSettings::default().signal_capacity,
            ),
        };

        if feed.symbol.is_empty() {
            return Err(ConfigError::EmptyValue("RELAY_SYMBOL".to_string()));
        }
        if history.capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_HISTORY_CAPACITY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if broadcast.signal_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_SIGNAL_CAPACITY".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server,
            feed,
            history,
            broadcast,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has an empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an invalid value.
    #[error("environment variable {0} is invalid: {1}")]
    InvalidValue(String, String),
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
