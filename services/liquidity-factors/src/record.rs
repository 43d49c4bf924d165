//! Per-minute records
//!
//! `MinuteSummary` is the merge of the three closed accumulators for one
//! elapsed minute. It can only be built from a quote summary *and* a depth
//! summary, so a minute missing either stream never reaches the scorer.
//!
//! `ScoreRecord` is the immutable output emitted downstream, one JSON
//! object per scored minute.

use serde::{Deserialize, Serialize};

use crate::depth::DepthSummary;
use crate::quote::QuoteSummary;
use crate::stats::EPS;
use crate::trades::TradeSummary;

/// Merged closed-minute data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteSummary {
    /// Start of the minute, Unix milliseconds.
    pub minute_start_ms: i64,
    /// Mid-price return over the minute, `mid_close / mid_open - 1`.
    pub ret_1m: f64,
    pub quote: QuoteSummary,
    pub depth: DepthSummary,
    pub trade: TradeSummary,
}

impl MinuteSummary {
    pub fn merge(
        minute_start_ms: i64,
        quote: QuoteSummary,
        depth: DepthSummary,
        trade: TradeSummary,
    ) -> Self {
        let ret_1m = quote.mid_close / (quote.mid_open + EPS) - 1.0;
        Self {
            minute_start_ms,
            ret_1m,
            quote,
            depth,
            trade,
        }
    }
}

/// Composite scores before the logistic squash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatentScores {
    pub lhf_good: f64,
    pub cold_bad: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreFlags {
    /// Strong one-sided flow absorbed with negligible price movement.
    pub absorption: bool,
    /// 1.0 when flow and price agree, 0.0 when they disagree, 0.5 neutral.
    pub flow_cons: f64,
}

/// Scored minute, as emitted to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Minute start, Unix seconds.
    pub t: i64,
    /// Liquidity Health Factor, 0..=100, higher is healthier.
    #[serde(rename = "LHF")]
    pub lhf: f64,
    /// Cold/Fragility Factor, 0..=100, higher is more fragile.
    #[serde(rename = "COLD")]
    pub cold: f64,
    pub ret_1m: f64,
    pub impact: f64,
    pub dollar_vol: f64,
    pub cvd_delta: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spike_ratio: f64,
    pub depth_usd_median: f64,
    pub depth_usd_p10: f64,
    pub depth_recover: f64,
    pub imb_median: f64,
    pub scores: LatentScores,
    pub flags: ScoreFlags,
}

impl ScoreRecord {
    pub fn minute_start_ms(&self) -> i64 {
        self.t * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(mid_open: f64, mid_close: f64) -> QuoteSummary {
        QuoteSummary {
            mid_open,
            mid_close,
            spread_median: 0.0001,
            spread_p95: 0.0001,
            spread_max: 0.0001,
            spike_ratio: 1.0,
            n_updates: 1,
        }
    }

    fn depth() -> DepthSummary {
        DepthSummary {
            depth_usd_median: 1.0,
            depth_usd_p10: 1.0,
            depth_usd_min: 1.0,
            imb_median: 0.0,
            depth_recover: 1.0,
            n_updates: 1,
        }
    }

    #[test]
    fn test_merge_computes_mid_return() {
        let summary = MinuteSummary::merge(60_000, quote(100.0, 100.2), depth(), TradeSummary::default());
        assert!((summary.ret_1m - 0.002).abs() < 1e-9);
        assert_eq!(summary.minute_start_ms, 60_000);
    }

    #[test]
    fn test_score_record_json_shape() {
        let record = ScoreRecord {
            t: 1_708_123_440,
            lhf: 55.0,
            cold: 45.0,
            ret_1m: 0.0,
            impact: 0.0,
            dollar_vol: 0.0,
            cvd_delta: 0.0,
            spread_median: 0.0001,
            spread_p95: 0.0001,
            spike_ratio: 1.0,
            depth_usd_median: 1_900_000.0,
            depth_usd_p10: 1_900_000.0,
            depth_recover: 1.0,
            imb_median: 0.05,
            scores: LatentScores {
                lhf_good: 0.1,
                cold_bad: -0.1,
            },
            flags: ScoreFlags {
                absorption: false,
                flow_cons: 0.5,
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["t"], 1_708_123_440);
        assert_eq!(value["LHF"], 55.0);
        assert_eq!(value["COLD"], 45.0);
        assert_eq!(value["scores"]["lhf_good"], 0.1);
        assert_eq!(value["flags"]["absorption"], false);
        assert_eq!(value["flags"]["flow_cons"], 0.5);
        assert!(value.get("lhf").is_none());
        assert_eq!(record.minute_start_ms(), 1_708_123_440_000);
    }
}
