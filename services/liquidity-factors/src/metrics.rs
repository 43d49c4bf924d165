//! Observability and metrics for the liquidity factor service
//!
//! Counters for tick processing, minute emission and feed health, plus a
//! rolling latency tracker for per-tick processing time. Shared between the
//! driver task, the feed task and the status server behind an `Arc`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::driver::DriverStats;

/// Core metrics for the liquidity factor service.
pub struct ServiceMetrics {
    // Tick processing
    pub ticks_processed: AtomicU64,
    pub ticks_rejected: AtomicU64,
    pub ticks_late: AtomicU64,
    pub tick_processing_ns: Mutex<LatencyTracker>,

    // Minute output
    pub minutes_emitted: AtomicU64,
    pub minutes_skipped: AtomicU64,
    pub gap_minutes: AtomicU64,
    pub records_dropped: AtomicU64,

    // Feed
    pub feed_reconnects: AtomicU64,
    pub feed_decode_errors: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            ticks_processed: AtomicU64::new(0),
            ticks_rejected: AtomicU64::new(0),
            ticks_late: AtomicU64::new(0),
            tick_processing_ns: Mutex::new(LatencyTracker::new(1000)),
            minutes_emitted: AtomicU64::new(0),
            minutes_skipped: AtomicU64::new(0),
            gap_minutes: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            feed_reconnects: AtomicU64::new(0),
            feed_decode_errors: AtomicU64::new(0),
        }
    }

    /// Record a tick that made it through the driver.
    pub fn record_tick_processed(&self, latency_ns: u64) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut tracker) = self.tick_processing_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    pub fn record_tick_rejected(&self) {
        self.ticks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_minute_emitted(&self) {
        self.minutes_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_minute_skipped(&self) {
        self.minutes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a score record dropped because the emission queue was full.
    pub fn record_emission_drop(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.feed_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.feed_decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Evaluate alert thresholds against the current counters.
    ///
    /// Counters are cumulative, so a breached threshold fires on every call;
    /// nothing is retained between calls.
    pub fn check_thresholds(&self, thresholds: &AlertThresholds) -> Vec<Alert> {
        let mut alerts = Vec::new();

        let rejected = self.ticks_rejected.load(Ordering::Relaxed);
        if rejected > thresholds.max_ticks_rejected {
            alerts.push(Alert {
                level: AlertLevel::Warning,
                metric: "ticks_rejected".to_string(),
                message: format!(
                    "Ticks rejected: {} > threshold {}",
                    rejected, thresholds.max_ticks_rejected
                ),
            });
        }

        let late = self.ticks_late.load(Ordering::Relaxed);
        if late > thresholds.max_ticks_late {
            alerts.push(Alert {
                level: AlertLevel::Info,
                metric: "ticks_late".to_string(),
                message: format!("Late ticks: {} > threshold {}", late, thresholds.max_ticks_late),
            });
        }

        let dropped = self.records_dropped.load(Ordering::Relaxed);
        if dropped > thresholds.max_records_dropped {
            alerts.push(Alert {
                level: AlertLevel::Critical,
                metric: "records_dropped".to_string(),
                message: format!(
                    "Score records dropped: {} > threshold {}",
                    dropped, thresholds.max_records_dropped
                ),
            });
        }

        if let Ok(tracker) = self.tick_processing_ns.lock() {
            if let Some(p99) = tracker.percentile(99) {
                if p99 > thresholds.max_tick_processing_p99_ns {
                    alerts.push(Alert {
                        level: AlertLevel::Warning,
                        metric: "tick_processing_p99".to_string(),
                        message: format!(
                            "Tick processing p99: {}ns > threshold {}ns",
                            p99, thresholds.max_tick_processing_p99_ns
                        ),
                    });
                }
            }
        }

        alerts
    }

    /// Fold the driver's own counters in; they are authoritative for late
    /// ticks and gaps.
    pub fn sync_driver_stats(&self, stats: &DriverStats) {
        self.ticks_late.store(stats.late_ticks, Ordering::Relaxed);
        self.gap_minutes.store(stats.gap_minutes, Ordering::Relaxed);
    }

    /// Export metrics as a sorted map.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let counters = [
            ("ticks_processed", &self.ticks_processed),
            ("ticks_rejected", &self.ticks_rejected),
            ("ticks_late", &self.ticks_late),
            ("minutes_emitted", &self.minutes_emitted),
            ("minutes_skipped", &self.minutes_skipped),
            ("gap_minutes", &self.gap_minutes),
            ("records_dropped", &self.records_dropped),
            ("feed_reconnects", &self.feed_reconnects),
            ("feed_decode_errors", &self.feed_decode_errors),
        ];

        let mut m: BTreeMap<String, u64> = counters
            .into_iter()
            .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed)))
            .collect();

        if let Ok(tracker) = self.tick_processing_ns.lock() {
            if let Some(avg) = tracker.average() {
                m.insert("tick_processing_avg_ns".to_string(), avg);
            }
            if let Some(p50) = tracker.percentile(50) {
                m.insert("tick_processing_p50_ns".to_string(), p50);
            }
            if let Some(p99) = tracker.percentile(99) {
                m.insert("tick_processing_p99_ns".to_string(), p99);
            }
        }
        m
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Nearest-rank percentile (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p.min(100) as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }
}

/// Alert severity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// An alert triggered by threshold breach.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
}

/// Configurable alert thresholds.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub max_ticks_rejected: u64,
    pub max_ticks_late: u64,
    /// Any sustained emission drop means the consumer is stuck.
    pub max_records_dropped: u64,
    pub max_tick_processing_p99_ns: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_ticks_rejected: 1_000,
            max_ticks_late: 1_000,
            max_records_dropped: 0,
            max_tick_processing_p99_ns: 1_000_000, // 1ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServiceMetrics::new();

        metrics.record_tick_processed(500);
        metrics.record_tick_processed(1000);
        metrics.record_tick_rejected();
        metrics.record_minute_emitted();
        metrics.record_minute_skipped();

        let exported = metrics.export();
        assert_eq!(exported["ticks_processed"], 2);
        assert_eq!(exported["ticks_rejected"], 1);
        assert_eq!(exported["minutes_emitted"], 1);
        assert_eq!(exported["minutes_skipped"], 1);
        assert_eq!(exported["tick_processing_p50_ns"], 500);
        assert_eq!(exported["tick_processing_avg_ns"], 750);
    }

    #[test]
    fn test_export_without_latency_samples() {
        let exported = ServiceMetrics::new().export();
        assert_eq!(exported["ticks_processed"], 0);
        assert!(!exported.contains_key("tick_processing_p99_ns"));
        assert!(!exported.contains_key("tick_processing_avg_ns"));
    }

    #[test]
    fn test_latency_tracker_percentile() {
        let mut tracker = LatencyTracker::new(100);

        for i in 1..=100 {
            tracker.record(i);
        }

        let p50 = tracker.percentile(50).unwrap();
        assert!((49..=51).contains(&p50));

        let p99 = tracker.percentile(99).unwrap();
        assert!((98..=100).contains(&p99));
    }

    #[test]
    fn test_latency_tracker_window_eviction() {
        let mut tracker = LatencyTracker::new(3);

        tracker.record(10);
        tracker.record(20);
        tracker.record(30);
        tracker.record(40);

        assert_eq!(tracker.average().unwrap(), 30);
        assert_eq!(tracker.percentile(0), Some(20));
    }

    #[test]
    fn test_alert_thresholds() {
        let metrics = ServiceMetrics::new();
        let thresholds = AlertThresholds {
            max_ticks_rejected: 5,
            max_ticks_late: 5,
            max_records_dropped: 0,
            max_tick_processing_p99_ns: 500,
        };

        assert!(metrics.check_thresholds(&thresholds).is_empty());

        for _ in 0..10 {
            metrics.record_tick_rejected();
        }
        metrics.record_emission_drop();

        let alerts = metrics.check_thresholds(&thresholds);
        assert!(alerts.iter().any(|a| a.metric == "ticks_rejected"));
        assert!(alerts
            .iter()
            .any(|a| a.metric == "records_dropped" && a.level == AlertLevel::Critical));
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_repeated_checks_do_not_accumulate() {
        let metrics = ServiceMetrics::new();
        metrics.record_emission_drop();
        let thresholds = AlertThresholds::default();

        for _ in 0..10_000 {
            assert_eq!(metrics.check_thresholds(&thresholds).len(), 1);
        }
        let alerts = metrics.check_thresholds(&thresholds);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, "records_dropped");
    }

    #[test]
    fn test_sync_driver_stats() {
        let metrics = ServiceMetrics::new();
        metrics.sync_driver_stats(&DriverStats {
            late_ticks: 4,
            gap_minutes: 2,
            ..DriverStats::default()
        });

        let exported = metrics.export();
        assert_eq!(exported["ticks_late"], 4);
        assert_eq!(exported["gap_minutes"], 2);
    }
}
