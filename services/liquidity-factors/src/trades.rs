//! Executed-trade minute accumulator
//!
//! Aggregates taker order flow: notional traded, taker buy/sell quantity
//! and the resulting volume delta. A minute without trades is reported as
//! zero activity rather than missing data, since a trade drought is itself
//! a liquidity signal.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Closed-minute summary of the trade stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    /// Σ price × quantity.
    pub dollar_volume: f64,
    /// Quantity bought by takers.
    pub buy_qty: f64,
    /// Quantity sold by takers.
    pub sell_qty: f64,
    /// `buy_qty - sell_qty`.
    pub cvd_delta: f64,
    pub total_qty: f64,
    pub n_trades: u64,
}

/// Accumulates executed trades for one minute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeAccumulator {
    dollar_volume: f64,
    buy_qty: f64,
    sell_qty: f64,
    total_qty: f64,
    n_trades: u64,
}

impl TradeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one trade.
    ///
    /// `is_taker_sell` is true when the buyer was the passive maker, i.e. the
    /// seller crossed the book. Non-finite or negative input is ignored.
    pub fn observe(&mut self, price: f64, quantity: f64, is_taker_sell: bool) -> bool {
        if !(price.is_finite() && quantity.is_finite() && price > 0.0 && quantity >= 0.0) {
            debug!(price, quantity, "Ignoring malformed trade");
            return false;
        }

        self.dollar_volume += price * quantity;
        self.total_qty += quantity;
        self.n_trades += 1;

        if is_taker_sell {
            self.sell_qty += quantity;
        } else {
            self.buy_qty += quantity;
        }
        true
    }

    pub fn n_trades(&self) -> u64 {
        self.n_trades
    }

    /// Close out the minute and reset. Never empty: a quiet minute reports
    /// zeros.
    pub fn close(&mut self) -> TradeSummary {
        let summary = TradeSummary {
            dollar_volume: self.dollar_volume,
            buy_qty: self.buy_qty,
            sell_qty: self.sell_qty,
            cvd_delta: self.buy_qty - self.sell_qty,
            total_qty: self.total_qty,
            n_trades: self.n_trades,
        };
        *self = Self::default();
        summary
    }
}
