//! Rolling normalization window
//!
//! Fixed-capacity history of the raw per-minute metrics the scorer
//! normalises against. One ring per metric; once full, every push evicts
//! the oldest entry. No decay weighting.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of minutes kept per metric.
pub const DEFAULT_WINDOW_CAPACITY: usize = 30;

/// Metrics tracked by the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMetric {
    Impact,
    SpreadMedian,
    SpreadP95,
    SpikeRatio,
    DepthMedian,
    DepthP10,
    DepthRecover,
    DollarVolume,
}

impl WindowMetric {
    pub const ALL: [WindowMetric; 8] = [
        WindowMetric::Impact,
        WindowMetric::SpreadMedian,
        WindowMetric::SpreadP95,
        WindowMetric::SpikeRatio,
        WindowMetric::DepthMedian,
        WindowMetric::DepthP10,
        WindowMetric::DepthRecover,
        WindowMetric::DollarVolume,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// One minute's raw metric values, as pushed after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSample {
    pub impact: f64,
    pub spread_median: f64,
    pub spread_p95: f64,
    pub spike_ratio: f64,
    pub depth_usd_median: f64,
    pub depth_usd_p10: f64,
    pub depth_recover: f64,
    pub dollar_volume: f64,
}

impl WindowSample {
    pub fn get(&self, metric: WindowMetric) -> f64 {
        match metric {
            WindowMetric::Impact => self.impact,
            WindowMetric::SpreadMedian => self.spread_median,
            WindowMetric::SpreadP95 => self.spread_p95,
            WindowMetric::SpikeRatio => self.spike_ratio,
            WindowMetric::DepthMedian => self.depth_usd_median,
            WindowMetric::DepthP10 => self.depth_usd_p10,
            WindowMetric::DepthRecover => self.depth_recover,
            WindowMetric::DollarVolume => self.dollar_volume,
        }
    }
}

/// Per-metric sliding history of closed minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    rings: [VecDeque<f64>; 8],
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl RollingWindow {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWindow capacity must be positive");
        Self {
            capacity,
            rings: std::array::from_fn(|_| VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one minute to every ring, evicting the oldest when full.
    pub fn push(&mut self, sample: &WindowSample) {
        for metric in WindowMetric::ALL {
            let ring = &mut self.rings[metric.index()];
            if ring.len() >= self.capacity {
                ring.pop_front();
            }
            ring.push_back(sample.get(metric));
        }
    }

    /// History of one metric, oldest first.
    pub fn history(&self, metric: WindowMetric) -> Vec<f64> {
        self.rings[metric.index()].iter().copied().collect()
    }

    /// History of one metric mapped through `ln(1 + x)`.
    pub fn log1p_history(&self, metric: WindowMetric) -> Vec<f64> {
        self.rings[metric.index()].iter().map(|v| v.ln_1p()).collect()
    }

    /// Number of minutes held. All rings advance together.
    pub fn len(&self) -> usize {
        self.rings[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }
}
