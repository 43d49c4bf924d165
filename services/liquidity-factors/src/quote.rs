//! Best bid/ask minute accumulator
//!
//! Collects every quote update inside the open minute and, on close,
//! summarises the relative-spread distribution together with the opening
//! and closing mid price.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stats::{self, EPS};

/// Closed-minute summary of the quote stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSummary {
    /// First mid price of the minute.
    pub mid_open: f64,
    /// Last mid price of the minute.
    pub mid_close: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spread_max: f64,
    /// `spread_max / spread_median`; large values flag momentary spread blowouts.
    pub spike_ratio: f64,
    pub n_updates: usize,
}

/// Accumulates best bid/ask updates for one minute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteAccumulator {
    spreads: Vec<f64>,
    first_mid: Option<f64>,
    last_mid: Option<f64>,
}

impl QuoteAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one quote update.
    ///
    /// Returns false (and records nothing) unless `ask >= bid > 0` and both
    /// are finite.
    pub fn observe(&mut self, bid: f64, ask: f64) -> bool {
        if !(bid.is_finite() && ask.is_finite() && bid > 0.0 && ask >= bid) {
            debug!(bid, ask, "Ignoring malformed quote");
            return false;
        }

        let mid = (bid + ask) / 2.0;
        let relative_spread = (ask - bid) / (mid + EPS);

        if self.first_mid.is_none() {
            self.first_mid = Some(mid);
        }
        self.last_mid = Some(mid);
        self.spreads.push(relative_spread);
        true
    }

    /// Number of updates observed in the open minute.
    pub fn len(&self) -> usize {
        self.spreads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spreads.is_empty()
    }

    /// Close out the minute and reset.
    ///
    /// Returns `None` when no quote was observed.
    pub fn close(&mut self) -> Option<QuoteSummary> {
        let summary = match (self.first_mid, self.last_mid) {
            (Some(mid_open), Some(mid_close)) if !self.spreads.is_empty() => {
                let sorted = stats::sorted(&self.spreads);
                let spread_median = stats::quantile_sorted(&sorted, 0.5);
                let spread_max = stats::quantile_sorted(&sorted, 1.0);
                Some(QuoteSummary {
                    mid_open,
                    mid_close,
                    spread_median,
                    spread_p95: stats::quantile_sorted(&sorted, 0.95),
                    spread_max,
                    spike_ratio: spread_max / (spread_median + EPS),
                    n_updates: sorted.len(),
                })
            }
            _ => None,
        };
        self.reset();
        summary
    }

    fn reset(&mut self) {
        self.spreads.clear();
        self.first_mid = None;
        self.last_mid = None;
    }
}
