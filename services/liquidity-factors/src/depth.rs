//! Top-of-book depth minute accumulator
//!
//! Each snapshot is reduced to the quote-currency notional resting on the
//! first N levels of each side. The minute summary describes how much depth
//! there was, how thin it got, how lopsided it was, and whether it came
//! back by the end of the minute.

use serde::{Deserialize, Serialize};
use types::tick::Level;

use crate::stats::{self, EPS};

/// Default number of levels per side.
pub const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Closed-minute summary of the depth stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSummary {
    pub depth_usd_median: f64,
    pub depth_usd_p10: f64,
    pub depth_usd_min: f64,
    /// Median of `(bid_usd - ask_usd) / total`.
    pub imb_median: f64,
    /// Closing over opening total depth. Below 1 means depth was consumed
    /// and not replenished.
    pub depth_recover: f64,
    pub n_updates: usize,
}

/// Accumulates depth snapshots for one minute.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthAccumulator {
    n_levels: usize,
    totals: Vec<f64>,
    imbalances: Vec<f64>,
    first_total: Option<f64>,
    last_total: Option<f64>,
}

impl Default for DepthAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH_LEVELS)
    }
}

impl DepthAccumulator {
    pub fn new(n_levels: usize) -> Self {
        Self {
            n_levels,
            totals: Vec::new(),
            imbalances: Vec::new(),
            first_total: None,
            last_total: None,
        }
    }

    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// Record one snapshot. Only the first `n_levels` of each side count.
    pub fn observe(&mut self, bids: &[Level], asks: &[Level]) {
        let bid_usd = side_notional(bids, self.n_levels);
        let ask_usd = side_notional(asks, self.n_levels);
        let total = bid_usd + ask_usd;
        let imbalance = (bid_usd - ask_usd) / (total + EPS);

        if self.first_total.is_none() {
            self.first_total = Some(total);
        }
        self.last_total = Some(total);
        self.totals.push(total);
        self.imbalances.push(imbalance);
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Close out the minute and reset.
    ///
    /// Returns `None` when no snapshot was observed.
    pub fn close(&mut self) -> Option<DepthSummary> {
        let summary = match (self.first_total, self.last_total) {
            (Some(first), Some(last)) if !self.totals.is_empty() => {
                let sorted = stats::sorted(&self.totals);
                Some(DepthSummary {
                    depth_usd_median: stats::quantile_sorted(&sorted, 0.5),
                    depth_usd_p10: stats::quantile_sorted(&sorted, 0.10),
                    depth_usd_min: sorted[0],
                    imb_median: stats::median(&self.imbalances).unwrap_or(0.0),
                    depth_recover: last / (first + EPS),
                    n_updates: sorted.len(),
                })
            }
            _ => None,
        };
        self.reset();
        summary
    }

    fn reset(&mut self) {
        self.totals.clear();
        self.imbalances.clear();
        self.first_total = None;
        self.last_total = None;
    }
}

fn side_notional(levels: &[Level], n_levels: usize) -> f64 {
    levels.iter().take(n_levels).map(Level::notional).sum()
}
