//! Score record emission with bounded backpressure
//!
//! The driver must never block on a slow consumer: records go through a
//! bounded queue with `try_send`, and a full queue drops the record with a
//! warning instead of stalling tick processing. The most recent record is
//! also published on a watch channel for the status endpoint.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::record::ScoreRecord;

/// Default emission queue capacity.
pub const DEFAULT_EMIT_QUEUE: usize = 1024;

/// What happened to one emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitOutcome {
    /// Queued for the sink.
    Sent,
    /// Queue full; the record was dropped.
    Dropped,
    /// Sink is gone.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum EmissionError {
    #[error("failed to serialize score record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write score record: {0}")]
    Io(#[from] std::io::Error),
}

/// Producer side of the record queue.
pub struct Emitter {
    tx: mpsc::Sender<ScoreRecord>,
    latest: watch::Sender<Option<ScoreRecord>>,
    records_sent: u64,
    records_dropped: u64,
}

impl Emitter {
    /// Create an emitter and the receiver its sink drains.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScoreRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (latest, _) = watch::channel(None);
        (
            Self {
                tx,
                latest,
                records_sent: 0,
                records_dropped: 0,
            },
            rx,
        )
    }

    /// Watch the most recently emitted record.
    pub fn subscribe_latest(&self) -> watch::Receiver<Option<ScoreRecord>> {
        self.latest.subscribe()
    }

    /// Hand a record to the sink without waiting.
    pub fn emit(&mut self, record: ScoreRecord) -> EmitOutcome {
        self.latest.send_replace(Some(record.clone()));

        let t = record.t;
        match self.tx.try_send(record) {
            Ok(()) => {
                self.records_sent += 1;
                debug!(t, "Score record queued");
                EmitOutcome::Sent
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.records_dropped += 1;
                warn!(
                    t,
                    records_dropped = self.records_dropped,
                    "Emission queue full, dropping score record"
                );
                EmitOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(t, "Emission sink closed");
                EmitOutcome::Closed
            }
        }
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    pub fn records_dropped(&self) -> u64 {
        self.records_dropped
    }
}

/// Drain records into `writer` as JSON lines, flushing after each one.
///
/// Returns the number of records written once every sender is gone.
pub async fn run_json_sink<W>(
    mut rx: mpsc::Receiver<ScoreRecord>,
    writer: &mut W,
) -> Result<u64, EmissionError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(record) = rx.recv().await {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        written += 1;
    }
    debug!(written, "JSON sink drained");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LatentScores, ScoreFlags};

    fn record(t: i64) -> ScoreRecord {
        ScoreRecord {
            t,
            lhf: 50.0,
            cold: 50.0,
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
                lhf_good: 0.0,
                cold_bad: 0.0,
            },
            flags: ScoreFlags {
                absorption: false,
                flow_cons: 0.5,
            },
        }
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (mut emitter, _rx) = Emitter::new(2);

        assert_eq!(emitter.emit(record(60)), EmitOutcome::Sent);
        assert_eq!(emitter.emit(record(120)), EmitOutcome::Sent);
        assert_eq!(emitter.emit(record(180)), EmitOutcome::Dropped);

        assert_eq!(emitter.records_sent(), 2);
        assert_eq!(emitter.records_dropped(), 1);
    }

    #[test]
    fn test_closed_sink_reported() {
        let (mut emitter, rx) = Emitter::new(2);
        drop(rx);
        assert_eq!(emitter.emit(record(60)), EmitOutcome::Closed);
    }

    #[test]
    fn test_latest_tracks_dropped_records_too() {
        let (mut emitter, _rx) = Emitter::new(1);
        let latest = emitter.subscribe_latest();
        assert!(latest.borrow().is_none());

        emitter.emit(record(60));
        emitter.emit(record(120));
        assert_eq!(latest.borrow().as_ref().map(|r| r.t), Some(120));
    }

    #[tokio::test]
    async fn test_json_sink_writes_lines_in_order() {
        let (mut emitter, rx) = Emitter::new(8);
        emitter.emit(record(60));
        emitter.emit(record(120));
        drop(emitter);

        let mut out: Vec<u8> = Vec::new();
        let written = run_json_sink(rx, &mut out).await.unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["t"], 60);
        assert_eq!(first["LHF"], 50.0);
        let second: ScoreRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.t, 120);
        assert_eq!(second.flags.flow_cons, 0.5);
    }
}
