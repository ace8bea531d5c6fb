//! Binance Stream Messages
//!
//! Wire types for the Binance 24h ticker stream (`<symbol>@ticker`).
//! Fields use Binance's terse single-letter names; numeric values arrive as
//! strings and are parsed on demand.

use serde::Deserialize;

use crate::domain::history::PricePoint;

/// A 24h ticker update for one symbol.
///
/// Only the fields the relay uses are deserialized; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerMessage {
    /// Event time (milliseconds since epoch).
    #[serde(rename = "E", default)]
    pub event_time: u64,
    /// Symbol, uppercase (e.g. `BTCUSDT`).
    #[serde(rename = "s", default)]
    pub symbol: String,
    /// Last (current) price, string-encoded decimal.
    #[serde(rename = "c")]
    pub last_price: String,
    /// Price change percent over the window.
    #[serde(rename = "P", default)]
    pub price_change_percent: String,
    /// High price over the window.
    #[serde(rename = "h", default)]
    pub high_price: String,
    /// Low price over the window.
    #[serde(rename = "l", default)]
    pub low_price: String,
    /// Total traded base asset volume.
    #[serde(rename = "v", default)]
    pub volume: String,
}

impl TickerMessage {
    /// Parse the last price into a point suitable for the history buffer.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the `c` field is not a valid number.
    pub fn price(&self) -> Result<PricePoint, std::num::ParseFloatError> {
        self.last_price.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "e": "24hrTicker",
        "E": 1700000000000,
        "s": "BTCUSDT",
        "p": "250.00",
        "P": "0.51",
        "c": "50001.25",
        "h": "50500.00",
        "l": "49100.00",
        "v": "12345.6"
    }"#;

    #[test]
    fn deserializes_ticker_fields() {
        let msg: TickerMessage = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(msg.symbol, "BTCUSDT");
        assert_eq!(msg.event_time, 1_700_000_000_000);
        assert_eq!(msg.last_price, "50001.25");
        assert_eq!(msg.price_change_percent, "0.51");
    }

    #[test]
    fn parses_last_price() {
        let msg: TickerMessage = serde_json::from_str(SAMPLE).unwrap();
        assert!((msg.price().unwrap() - 50001.25).abs() < f64::EPSILON);
    }

    #[test]
    fn price_parse_fails_on_garbage() {
        let msg: TickerMessage =
            serde_json::from_str(r#"{"c": "not-a-number"}"#).unwrap();
        assert!(msg.price().is_err());
    }

    #[test]
    fn missing_price_field_is_a_deserialize_error() {
        let result: Result<TickerMessage, _> = serde_json::from_str(r#"{"s": "BTCUSDT"}"#);
        assert!(result.is_err());
    }
}
