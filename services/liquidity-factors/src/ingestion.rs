//! Tick ingestion layer for the liquidity factor service
//!
//! Validates incoming ticks before they reach the minute driver. A rejected
//! tick is counted per stream kind and logged with its reason; it never
//! touches accumulator state.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use types::errors::TickError;
use types::tick::{StreamKind, Tick, TickPayload};

/// Errors that can occur during tick ingestion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestionError {
    #[error("malformed {kind:?} tick: {source}")]
    Malformed {
        kind: StreamKind,
        #[source]
        source: TickError,
    },

    #[error("locked quote rejected: bid == ask == {price}")]
    LockedQuote { price: String },

    #[error("zero-quantity trade rejected at {event_time_ms}")]
    ZeroQuantityTrade { event_time_ms: i64 },
}

/// Configuration for the tick ingester.
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// Accept quotes with `bid == ask`.
    pub allow_locked_quotes: bool,
    /// Reject trades that report a zero quantity.
    pub reject_zero_quantity_trades: bool,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            allow_locked_quotes: true,
            reject_zero_quantity_trades: false,
        }
    }
}

/// Accepted/rejected counts for one stream kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub accepted: u64,
    pub rejected: u64,
}

/// Validates ticks and keeps per-stream counters.
pub struct TickIngester {
    config: IngesterConfig,
    counters: BTreeMap<StreamKind, StreamCounters>,
}

impl TickIngester {
    pub fn new(config: IngesterConfig) -> Self {
        debug!(
            allow_locked_quotes = config.allow_locked_quotes,
            reject_zero_quantity_trades = config.reject_zero_quantity_trades,
            "TickIngester initialized"
        );

        Self {
            config,
            counters: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(IngesterConfig::default())
    }

    /// Validate one tick. On success the tick is returned unchanged for the
    /// driver; on failure it is counted and dropped by the caller.
    pub fn ingest(&mut self, tick: Tick) -> Result<Tick, IngestionError> {
        let kind = tick.kind();

        match self.check(&tick) {
            Ok(()) => {
                self.counters.entry(kind).or_default().accepted += 1;
                Ok(tick)
            }
            Err(err) => {
                let counters = self.counters.entry(kind).or_default();
                counters.rejected += 1;
                warn!(
                    stream = kind.as_str(),
                    event_time_ms = tick.event_time_ms,
                    rejected = counters.rejected,
                    error = %err,
                    "Rejecting tick"
                );
                Err(err)
            }
        }
    }

    pub fn counters(&self, kind: StreamKind) -> StreamCounters {
        self.counters.get(&kind).copied().unwrap_or_default()
    }

    /// Total accepted across all streams.
    pub fn ticks_accepted(&self) -> u64 {
        self.counters.values().map(|c| c.accepted).sum()
    }

    /// Total rejected across all streams.
    pub fn ticks_rejected(&self) -> u64 {
        self.counters.values().map(|c| c.rejected).sum()
    }

    fn check(&self, tick: &Tick) -> Result<(), IngestionError> {
        tick.validate().map_err(|source| IngestionError::Malformed {
            kind: tick.kind(),
            source,
        })?;

        match &tick.payload {
            TickPayload::Quote { bid, ask } if !self.config.allow_locked_quotes && bid == ask => {
                Err(IngestionError::LockedQuote {
                    price: bid.to_string(),
                })
            }
            TickPayload::Trade { quantity, .. }
                if self.config.reject_zero_quantity_trades && quantity.is_zero() =>
            {
                Err(IngestionError::ZeroQuantityTrade {
                    event_time_ms: tick.event_time_ms,
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::numeric::{Price, Quantity};
    use types::tick::Level;

    fn px(s: &str) -> Price {
        Price::from_str(s).unwrap()
    }

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    #[test]
    fn test_valid_ticks_accepted() {
        let mut ingester = TickIngester::with_defaults();

        let quote = Tick::quote(1_000, px("100"), px("101"));
        assert_eq!(ingester.ingest(quote.clone()).unwrap(), quote);
        ingester
            .ingest(Tick::trade(1_001, px("100.5"), qty("0.2"), true))
            .unwrap();
        ingester
            .ingest(Tick::depth(
                1_002,
                vec![Level::new(px("100"), qty("1"))],
                vec![Level::new(px("101"), qty("2"))],
            ))
            .unwrap();

        assert_eq!(ingester.ticks_accepted(), 3);
        assert_eq!(ingester.ticks_rejected(), 0);
        assert_eq!(ingester.counters(StreamKind::Quote).accepted, 1);
    }

    #[test]
    fn test_crossed_quote_rejected() {
        let mut ingester = TickIngester::with_defaults();

        let result = ingester.ingest(Tick::quote(1_000, px("101"), px("100")));
        match result.unwrap_err() {
            IngestionError::Malformed { kind, source } => {
                assert_eq!(kind, StreamKind::Quote);
                assert!(matches!(source, TickError::CrossedQuote { .. }));
            }
            err => panic!("Expected Malformed, got {:?}", err),
        }
        assert_eq!(
            ingester.counters(StreamKind::Quote),
            StreamCounters {
                accepted: 0,
                rejected: 1
            }
        );
    }

    #[test]
    fn test_empty_depth_side_rejected() {
        let mut ingester = TickIngester::with_defaults();

        let result = ingester.ingest(Tick::depth(
            1_000,
            vec![Level::new(px("100"), qty("1"))],
            vec![],
        ));
        assert_eq!(
            result.unwrap_err(),
            IngestionError::Malformed {
                kind: StreamKind::Depth,
                source: TickError::EmptyDepthSide { side: "asks" },
            }
        );
        assert_eq!(ingester.counters(StreamKind::Depth).rejected, 1);
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let mut ingester = TickIngester::with_defaults();
        let result = ingester.ingest(Tick::trade(-5, px("100"), qty("1"), false));
        assert!(matches!(
            result,
            Err(IngestionError::Malformed {
                source: TickError::InvalidTimestamp(-5),
                ..
            })
        ));
    }

    #[test]
    fn test_locked_quote_policy() {
        let mut lenient = TickIngester::with_defaults();
        assert!(lenient.ingest(Tick::quote(1, px("100"), px("100"))).is_ok());

        let mut strict = TickIngester::new(IngesterConfig {
            allow_locked_quotes: false,
            ..IngesterConfig::default()
        });
        assert_eq!(
            strict.ingest(Tick::quote(1, px("100"), px("100"))).unwrap_err(),
            IngestionError::LockedQuote {
                price: "100".to_string()
            }
        );
    }

    #[test]
    fn test_zero_quantity_trade_policy() {
        let zero = Tick::trade(7, px("100"), Quantity::ZERO, false);

        let mut lenient = TickIngester::with_defaults();
        assert!(lenient.ingest(zero.clone()).is_ok());

        let mut strict = TickIngester::new(IngesterConfig {
            reject_zero_quantity_trades: true,
            ..IngesterConfig::default()
        });
        assert_eq!(
            strict.ingest(zero).unwrap_err(),
            IngestionError::ZeroQuantityTrade { event_time_ms: 7 }
        );
        assert_eq!(strict.ticks_rejected(), 1);
    }

    #[test]
    fn test_error_display_names_stream() {
        let err = IngestionError::Malformed {
            kind: StreamKind::Depth,
            source: TickError::EmptyDepthSide { side: "bids" },
        };
        assert_eq!(err.to_string(), "malformed Depth tick: Empty depth side: bids");
    }
}
