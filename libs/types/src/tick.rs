//! Market-data ticks
//!
//! A tick is one update from one of the three streams the liquidity engine
//! consumes: best bid/ask quotes, top-of-book depth snapshots, and executed
//! trades. Each carries the exchange event time in Unix milliseconds.

use serde::{Deserialize, Serialize};

use crate::errors::TickError;
use crate::numeric::{Price, Quantity};

/// Milliseconds in one aggregation minute.
pub const MINUTE_MS: i64 = 60_000;

/// Floor a millisecond timestamp to the start of its minute.
pub fn floor_minute_ms(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(MINUTE_MS) * MINUTE_MS
}

/// Stream a tick was published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Quote,
    Depth,
    Trade,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Quote => "quote",
            StreamKind::Depth => "depth",
            StreamKind::Trade => "trade",
        }
    }
}

/// One price level of a depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub price: Price,
    pub quantity: Quantity,
}

impl Level {
    pub fn new(price: Price, quantity: Quantity) -> Self {
        Self { price, quantity }
    }

    /// Quote-currency notional of the level (price × quantity).
    pub fn notional(&self) -> f64 {
        self.price.as_f64() * self.quantity.as_f64()
    }
}

/// Stream-specific tick contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stream", rename_all = "lowercase")]
pub enum TickPayload {
    /// Best bid / best ask update.
    Quote { bid: Price, ask: Price },

    /// Top-of-book snapshot, best level first on each side.
    Depth { bids: Vec<Level>, asks: Vec<Level> },

    /// Executed trade. `is_taker_sell` is true when the seller crossed the
    /// book (the buyer was the passive maker).
    Trade {
        price: Price,
        quantity: Quantity,
        is_taker_sell: bool,
    },
}

/// A timestamped tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Exchange event time, Unix milliseconds.
    pub event_time_ms: i64,
    pub payload: TickPayload,
}

impl Tick {
    pub fn quote(event_time_ms: i64, bid: Price, ask: Price) -> Self {
        Self {
            event_time_ms,
            payload: TickPayload::Quote { bid, ask },
        }
    }

    pub fn depth(event_time_ms: i64, bids: Vec<Level>, asks: Vec<Level>) -> Self {
        Self {
            event_time_ms,
            payload: TickPayload::Depth { bids, asks },
        }
    }

    pub fn trade(event_time_ms: i64, price: Price, quantity: Quantity, is_taker_sell: bool) -> Self {
        Self {
            event_time_ms,
            payload: TickPayload::Trade {
                price,
                quantity,
                is_taker_sell,
            },
        }
    }

    pub fn kind(&self) -> StreamKind {
        match &self.payload {
            TickPayload::Quote { .. } => StreamKind::Quote,
            TickPayload::Depth { .. } => StreamKind::Depth,
            TickPayload::Trade { .. } => StreamKind::Trade,
        }
    }

    /// Start of the minute this tick belongs to.
    pub fn minute_start_ms(&self) -> i64 {
        floor_minute_ms(self.event_time_ms)
    }

    /// Structural checks that the numeric newtypes cannot express on their own.
    pub fn validate(&self) -> Result<(), TickError> {
        if self.event_time_ms < 0 {
            return Err(TickError::InvalidTimestamp(self.event_time_ms));
        }
        match &self.payload {
            TickPayload::Quote { bid, ask } => {
                if ask < bid {
                    return Err(TickError::CrossedQuote {
                        bid: bid.to_string(),
                        ask: ask.to_string(),
                    });
                }
            }
            TickPayload::Depth { bids, asks } => {
                if bids.is_empty() {
                    return Err(TickError::EmptyDepthSide { side: "bids" });
                }
                if asks.is_empty() {
                    return Err(TickError::EmptyDepthSide { side: "asks" });
                }
            }
            TickPayload::Trade { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn px(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    #[test]
    fn test_floor_minute() {
        assert_eq!(floor_minute_ms(0), 0);
        assert_eq!(floor_minute_ms(59_999), 0);
        assert_eq!(floor_minute_ms(60_000), 60_000);
        assert_eq!(floor_minute_ms(1_708_123_456_789), 1_708_123_440_000);
    }

    #[test]
    fn test_tick_kind_and_minute() {
        let tick = Tick::quote(125_000, px("100"), px("100.5"));
        assert_eq!(tick.kind(), StreamKind::Quote);
        assert_eq!(tick.minute_start_ms(), 120_000);
    }

    #[test]
    fn test_crossed_quote_rejected() {
        let tick = Tick::quote(0, px("101"), px("100"));
        assert!(matches!(tick.validate(), Err(TickError::CrossedQuote { .. })));

        let locked = Tick::quote(0, px("100"), px("100"));
        assert!(locked.validate().is_ok());
    }

    #[test]
    fn test_empty_depth_side_rejected() {
        let level = Level::new(px("100"), Quantity::from_u64(1));
        let tick = Tick::depth(0, vec![], vec![level]);
        assert_eq!(
            tick.validate(),
            Err(TickError::EmptyDepthSide { side: "bids" })
        );
        let tick = Tick::depth(0, vec![level], vec![]);
        assert_eq!(
            tick.validate(),
            Err(TickError::EmptyDepthSide { side: "asks" })
        );
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let tick = Tick::trade(-1, px("100"), Quantity::from_u64(1), false);
        assert_eq!(tick.validate(), Err(TickError::InvalidTimestamp(-1)));
    }

    #[test]
    fn test_level_notional() {
        let level = Level::new(px("100000"), Quantity::from_str("2.5").unwrap());
        assert!((level.notional() - 250_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_stream_kind_serde_lowercase() {
        let json = serde_json::to_string(&StreamKind::Depth).unwrap();
        assert_eq!(json, "\"depth\"");
        assert_eq!(StreamKind::Trade.as_str(), "trade");
    }
}
