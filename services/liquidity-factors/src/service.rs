//! Service runtime
//!
//! Task layout:
//!
//! ```text
//!  feed ──ticks──▶ driver ──records──▶ JSON sink (stdout)
//!                    │
//!                    └──latest──▶ status server (optional)
//! ```
//!
//! The driver is the only task that touches accumulator state; ticks reach
//! it through one ordered queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{error, info, warn};
use types::tick::Tick;

use crate::config::ServiceConfig;
use crate::driver::{CloseOutcome, DriverOutcome, DriverStats, MinuteDriver};
use crate::emission::{run_json_sink, EmitOutcome, EmissionError, Emitter};
use crate::feed::run_feed;
use crate::ingestion::TickIngester;
use crate::metrics::{AlertLevel, AlertThresholds, ServiceMetrics};
use crate::status::{serve_status, StatusState};

const ALERT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),

    #[error("status server failed: {0}")]
    Status(#[source] std::io::Error),

    #[error("task panicked or was cancelled: {0}")]
    Join(#[from] JoinError),

    #[error(transparent)]
    Emission(#[from] EmissionError),
}

/// Consume ticks until shutdown, until the tick queue closes, or until the
/// record sink is gone.
///
/// The open minute at exit is discarded, never emitted.
pub async fn run_driver(
    mut driver: MinuteDriver,
    mut ticks: mpsc::Receiver<Tick>,
    mut ingester: TickIngester,
    mut emitter: Emitter,
    metrics: Arc<ServiceMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> DriverStats {
    info!(market = %driver.market(), "Driver started");

    loop {
        let tick = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            tick = ticks.recv() => match tick {
                Some(tick) => tick,
                None => break,
            },
        };

        let started = Instant::now();
        let tick = match ingester.ingest(tick) {
            Ok(tick) => tick,
            Err(_) => {
                metrics.record_tick_rejected();
                continue;
            }
        };

        let outcome = driver.process(&tick);
        if let DriverOutcome::Closed(close) = outcome {
            match close.outcome {
                CloseOutcome::Scored(record) => match emitter.emit(record) {
                    EmitOutcome::Sent => metrics.record_minute_emitted(),
                    EmitOutcome::Dropped => metrics.record_emission_drop(),
                    EmitOutcome::Closed => {
                        error!(market = %driver.market(), "Record sink gone, stopping driver");
                        break;
                    }
                },
                CloseOutcome::Skipped(_) => metrics.record_minute_skipped(),
            }
        }
        metrics.sync_driver_stats(&driver.stats());
        metrics.record_tick_processed(started.elapsed().as_nanos() as u64);
    }

    driver.discard_open_minute();
    let stats = driver.stats();
    metrics.sync_driver_stats(&stats);
    info!(
        minutes_scored = stats.minutes_scored,
        minutes_skipped = stats.minutes_skipped,
        late_ticks = stats.late_ticks,
        ticks_rejected = ingester.ticks_rejected(),
        records_dropped = emitter.records_dropped(),
        "Driver stopped"
    );
    stats
}

/// Periodically evaluate alert thresholds and log what fires.
pub async fn run_alert_monitor(
    metrics: Arc<ServiceMetrics>,
    thresholds: AlertThresholds,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                for alert in metrics.check_thresholds(&thresholds) {
                    match alert.level {
                        AlertLevel::Critical => error!(metric = %alert.metric, "{}", alert.message),
                        AlertLevel::Warning => warn!(metric = %alert.metric, "{}", alert.message),
                        AlertLevel::Info => info!(metric = %alert.metric, "{}", alert.message),
                    }
                }
            }
        }
    }
}

pub struct Service {
    config: ServiceConfig,
    metrics: Arc<ServiceMetrics>,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ServiceMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until Ctrl-C or until the record sink fails.
    pub async fn run(self) -> Result<(), ServiceError> {
        let Service { config, metrics } = self;

        info!(
            market = %config.market,
            url = %config.stream_url(),
            window = config.window_capacity,
            depth_levels = config.depth_levels,
            "Starting liquidity factor service"
        );

        let (tick_tx, tick_rx) = mpsc::channel(config.tick_queue);
        let (emitter, record_rx) = Emitter::new(config.emit_queue);
        let latest = emitter.subscribe_latest();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = MinuteDriver::new(config.market.clone(), config.driver_config());

        let feed = tokio::spawn(run_feed(
            config.feed_config(),
            tick_tx,
            Arc::clone(&metrics),
            shutdown_rx.clone(),
        ));
        let driver_task = tokio::spawn(run_driver(
            driver,
            tick_rx,
            TickIngester::with_defaults(),
            emitter,
            Arc::clone(&metrics),
            shutdown_rx.clone(),
        ));
        let mut sink = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            run_json_sink(record_rx, &mut stdout).await
        });
        let alerts = tokio::spawn(run_alert_monitor(
            Arc::clone(&metrics),
            AlertThresholds::default(),
            ALERT_CHECK_INTERVAL,
            shutdown_rx.clone(),
        ));
        let status = config.http_addr.map(|addr| {
            let state = StatusState {
                market: config.market.clone(),
                metrics: Arc::clone(&metrics),
                latest,
            };
            tokio::spawn(serve_status(addr, state, shutdown_rx.clone()))
        });

        let early_sink_exit = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.map_err(ServiceError::Signal)?;
                info!("Shutdown requested");
                None
            }
            res = &mut sink => {
                error!("Record sink stopped unexpectedly");
                Some(res)
            }
        };

        let _ = shutdown_tx.send(true);

        feed.await?;
        let stats = driver_task.await?;
        alerts.await?;
        let written = match early_sink_exit {
            Some(res) => res??,
            None => sink.await??,
        };
        if let Some(status) = status {
            status.await?.map_err(ServiceError::Status)?;
        }

        info!(
            records_written = written,
            minutes_scored = stats.minutes_scored,
            "Service stopped"
        );
        Ok(())
    }
}
