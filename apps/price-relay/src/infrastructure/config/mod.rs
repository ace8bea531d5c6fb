//! Configuration Module
//!
//! Environment-variable driven configuration for the relay.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, FeedSettings, HistorySettings, RelayConfig, ServerSettings,
};
