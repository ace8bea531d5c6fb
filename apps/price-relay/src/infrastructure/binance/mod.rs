//! Binance WebSocket Feed
//!
//! Upstream connection to the Binance combined ticker stream for a single
//! symbol. The client owns the connection lifecycle (connect, stream,
//! backoff, reconnect), translates ticker messages into price points, and
//! signals the broadcaster once per accepted message.

mod client;
mod codec;
mod messages;
mod reconnect;
mod status;

pub use client::{FeedClient, FeedClientError};
pub use codec::{CodecError, JsonCodec};
pub use messages::TickerMessage;
pub use reconnect::{BackoffConfig, BackoffPolicy};
pub use status::{ConnectionState, FeedStatus};
