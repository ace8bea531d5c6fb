//! Stream Codec Module
//!
//! Decodes inbound Binance ticker frames. A frame that is not valid JSON,
//! not a ticker object, or whose price field fails to parse is a codec
//! error; the feed client treats every codec error as a stream error and
//! re-enters the reconnect path rather than crashing the pipeline.

use crate::domain::history::PricePoint;

use super::messages::TickerMessage;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The price field was present but not a valid number.
    #[error("invalid price field: {0}")]
    InvalidPrice(#[from] std::num::ParseFloatError),
}

/// JSON codec for the Binance ticker stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a ticker message.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Json` if the frame is not a ticker object.
    pub fn decode(&self, text: &str) -> Result<TickerMessage, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode a text frame straight to the current price.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or price parsing fails.
    pub fn decode_price(&self, text: &str) -> Result<PricePoint, CodecError> {
        let msg = self.decode(text)?;
        Ok(msg.price()?)
    }
}
