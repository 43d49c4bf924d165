//! Factor scoring
//!
//! Turns one merged minute into the two composite scores:
//!
//! - **LHF** (Liquidity Health Factor): low impact, tight and calm spreads,
//!   deep and recovering book, flow agreeing with price.
//! - **COLD** (Cold/Fragility Factor): low volume, thin book, wide or spiky
//!   spreads, high impact, slow recovery.
//!
//! Every input is robust-z normalised against the rolling window *before*
//! the current minute is pushed into it, so a minute is never compared
//! with itself.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{LatentScores, MinuteSummary, ScoreFlags, ScoreRecord};
use crate::stats::{robust_z, squash, EPS};
use crate::window::{RollingWindow, WindowMetric, WindowSample};

/// Gain applied to the latent score before the logistic squash.
pub const SQUASH_GAIN: f64 = 1.2;

/// `|cvd_delta| / total_qty` above which flow counts as one-sided.
pub const ABSORPTION_MIN_INTENSITY: f64 = 0.55;

/// `|ret_1m|` below which the price is considered not to have moved.
pub const ABSORPTION_MAX_ABS_RETURN: f64 = 0.0003;

/// LHF weights. Signs are applied in [`lhf_good`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LhfWeights {
    pub impact: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spike_ratio: f64,
    pub depth_median: f64,
    pub depth_p10: f64,
    pub depth_recover: f64,
    pub flow_consistency: f64,
    pub absorption: f64,
}

pub const LHF_WEIGHTS: LhfWeights = LhfWeights {
    impact: 0.30,
    spread_median: 0.18,
    spread_p95: 0.10,
    spike_ratio: 0.07,
    depth_median: 0.20,
    depth_p10: 0.10,
    depth_recover: 0.10,
    flow_consistency: 0.05,
    absorption: 0.10,
};

/// COLD weights. Signs are applied in [`cold_bad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColdWeights {
    pub dollar_volume: f64,
    pub depth_median: f64,
    pub depth_p10: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spike_ratio: f64,
    pub impact: f64,
    pub depth_recover: f64,
    pub absorption: f64,
}

pub const COLD_WEIGHTS: ColdWeights = ColdWeights {
    dollar_volume: 0.28,
    depth_median: 0.18,
    depth_p10: 0.12,
    spread_median: 0.15,
    spread_p95: 0.07,
    spike_ratio: 0.06,
    impact: 0.10,
    depth_recover: 0.04,
    absorption: 0.05,
};

/// Robust z-scores of one minute against the rolling window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZScores {
    pub impact: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spike_ratio: f64,
    /// log1p domain
    pub depth_median: f64,
    /// log1p domain
    pub depth_p10: f64,
    pub depth_recover: f64,
    /// log1p domain
    pub dollar_volume: f64,
}

impl ZScores {
    /// Normalise the minute's metrics against `window` without mutating it.
    pub fn against(sample: &WindowSample, window: &RollingWindow) -> Self {
        let linear = |metric: WindowMetric| robust_z(sample.get(metric), &window.history(metric));
        let log1p = |metric: WindowMetric| {
            robust_z(sample.get(metric).ln_1p(), &window.log1p_history(metric))
        };

        Self {
            impact: linear(WindowMetric::Impact),
            spread_median: linear(WindowMetric::SpreadMedian),
            spread_p95: linear(WindowMetric::SpreadP95),
            spike_ratio: linear(WindowMetric::SpikeRatio),
            depth_median: log1p(WindowMetric::DepthMedian),
            depth_p10: log1p(WindowMetric::DepthP10),
            depth_recover: linear(WindowMetric::DepthRecover),
            dollar_volume: log1p(WindowMetric::DollarVolume),
        }
    }
}

/// Price move per unit of notional traded. Higher means thinner.
pub fn impact(ret_1m: f64, dollar_volume: f64) -> f64 {
    ret_1m.abs() / (dollar_volume + EPS)
}

/// Share of traded quantity that was net one-sided.
pub fn cvd_intensity(cvd_delta: f64, total_qty: f64) -> f64 {
    cvd_delta.abs() / (total_qty + EPS)
}

/// One-sided pressure met with a flat price: hidden or replenished
/// liquidity, treated as a risk rather than health.
pub fn absorption_flag(cvd_intensity: f64, dollar_volume: f64, ret_1m: f64) -> bool {
    cvd_intensity > ABSORPTION_MIN_INTENSITY
        && dollar_volume > 0.0
        && ret_1m.abs() < ABSORPTION_MAX_ABS_RETURN
}

/// 1.0 when order flow and price moved the same way, 0.0 when opposed,
/// 0.5 when either is flat.
pub fn flow_consistency(ret_1m: f64, cvd_delta: f64) -> f64 {
    if ret_1m == 0.0 || cvd_delta == 0.0 {
        0.5
    } else if ret_1m.signum() == cvd_delta.signum() {
        1.0
    } else {
        0.0
    }
}

/// Latent health score.
pub fn lhf_good(z: &ZScores, flow_consistency: f64, absorption: bool) -> f64 {
    let w = LHF_WEIGHTS;
    let absorption = if absorption { 1.0 } else { 0.0 };

    w.impact * -z.impact
        + w.spread_median * -z.spread_median
        + w.spread_p95 * -z.spread_p95
        + w.spike_ratio * -z.spike_ratio
        + w.depth_median * z.depth_median
        + w.depth_p10 * z.depth_p10
        + w.depth_recover * z.depth_recover
        + w.flow_consistency * (2.0 * flow_consistency - 1.0)
        + w.absorption * -absorption
}

/// Latent fragility score.
pub fn cold_bad(z: &ZScores, absorption: bool) -> f64 {
    let w = COLD_WEIGHTS;
    let absorption = if absorption { 1.0 } else { 0.0 };

    w.dollar_volume * -z.dollar_volume
        + w.depth_median * -z.depth_median
        + w.depth_p10 * -z.depth_p10
        + w.spread_median * z.spread_median
        + w.spread_p95 * z.spread_p95
        + w.spike_ratio * z.spike_ratio
        + w.impact * z.impact
        + w.depth_recover * -z.depth_recover
        + w.absorption * absorption
}

/// Map a latent score onto 0..=100.
pub fn to_factor(latent: f64) -> f64 {
    100.0 * squash(SQUASH_GAIN * latent)
}

/// Everything the scorer derived for one minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub impact: f64,
    pub cvd_intensity: f64,
    pub absorption: bool,
    pub flow_consistency: f64,
    pub z: ZScores,
    pub lhf_good: f64,
    pub cold_bad: f64,
    pub lhf: f64,
    pub cold: f64,
    /// Raw values pushed into the window after scoring.
    pub sample: WindowSample,
}

/// Scores minutes against a rolling window it owns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactorScorer {
    window: RollingWindow,
}

impl FactorScorer {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window: RollingWindow::new(window_capacity),
        }
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Derive all factor inputs and scores without touching the window.
    pub fn evaluate(&self, minute: &MinuteSummary) -> FactorBreakdown {
        let trade = &minute.trade;
        let impact = impact(minute.ret_1m, trade.dollar_volume);
        let cvd_intensity = cvd_intensity(trade.cvd_delta, trade.total_qty);
        let absorption = absorption_flag(cvd_intensity, trade.dollar_volume, minute.ret_1m);
        let flow_consistency = flow_consistency(minute.ret_1m, trade.cvd_delta);

        let sample = WindowSample {
            impact,
            spread_median: minute.quote.spread_median,
            spread_p95: minute.quote.spread_p95,
            spike_ratio: minute.quote.spike_ratio,
            depth_usd_median: minute.depth.depth_usd_median,
            depth_usd_p10: minute.depth.depth_usd_p10,
            depth_recover: minute.depth.depth_recover,
            dollar_volume: trade.dollar_volume,
        };

        let z = ZScores::against(&sample, &self.window);
        let lhf_good = lhf_good(&z, flow_consistency, absorption);
        let cold_bad = cold_bad(&z, absorption);

        FactorBreakdown {
            impact,
            cvd_intensity,
            absorption,
            flow_consistency,
            z,
            lhf_good,
            cold_bad,
            lhf: to_factor(lhf_good),
            cold: to_factor(cold_bad),
            sample,
        }
    }

    /// Score a minute, then push its raw metrics into the window.
    pub fn score(&mut self, minute: &MinuteSummary) -> ScoreRecord {
        let breakdown = self.evaluate(minute);
        self.window.push(&breakdown.sample);

        debug!(
            minute_start_ms = minute.minute_start_ms,
            lhf = breakdown.lhf,
            cold = breakdown.cold,
            history = self.window.len(),
            "Minute scored"
        );

        ScoreRecord {
            t: minute.minute_start_ms.div_euclid(1000),
            lhf: breakdown.lhf,
            cold: breakdown.cold,
            ret_1m: minute.ret_1m,
            impact: breakdown.impact,
            dollar_vol: minute.trade.dollar_volume,
            cvd_delta: minute.trade.cvd_delta,
            spread_median: minute.quote.spread_median,
            spread_p95: minute.quote.spread_p95,
            spike_ratio: minute.quote.spike_ratio,
            depth_usd_median: minute.depth.depth_usd_median,
            depth_usd_p10: minute.depth.depth_usd_p10,
            depth_recover: minute.depth.depth_recover,
            imb_median: minute.depth.imb_median,
            scores: LatentScores {
                lhf_good: breakdown.lhf_good,
                cold_bad: breakdown.cold_bad,
            },
            flags: ScoreFlags {
                absorption: breakdown.absorption,
                flow_cons: breakdown.flow_consistency,
            },
        }
    }
}
