//! Minute-boundary driver
//!
//! Owns the three stream accumulators and the factor scorer, and turns an
//! interleaved tick sequence into one closed minute per boundary crossing.
//!
//! Minute boundaries are aligned to the epoch. The first tick past the
//! boundary closes the open minute: all three accumulators are closed and
//! reset, and the minute is scored only when both quote and depth data were
//! seen. Ticks for a minute that has already been closed are dropped and
//! counted; a closed minute is never reopened, including after the open
//! minute has been discarded.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::ids::MarketId;
use types::tick::{Tick, TickPayload, MINUTE_MS};

use crate::depth::{DepthAccumulator, DEFAULT_DEPTH_LEVELS};
use crate::quote::QuoteAccumulator;
use crate::record::{MinuteSummary, ScoreRecord};
use crate::scoring::FactorScorer;
use crate::trades::TradeAccumulator;
use crate::window::DEFAULT_WINDOW_CAPACITY;

/// Configuration for the minute driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Depth levels per side counted by the depth accumulator.
    pub depth_levels: usize,
    /// Minutes of history used for normalisation.
    pub window_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            depth_levels: DEFAULT_DEPTH_LEVELS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}

/// Why a closed minute produced no score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    MissingQuotes,
    MissingDepth,
    MissingBoth,
}

/// Result of closing one minute.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Scored(ScoreRecord),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinuteClose {
    pub minute_start_ms: i64,
    pub outcome: CloseOutcome,
    /// Whole minutes between the closed minute and the new one that saw no
    /// ticks at all.
    pub gap_minutes: i64,
}

impl MinuteClose {
    pub fn record(&self) -> Option<&ScoreRecord> {
        match &self.outcome {
            CloseOutcome::Scored(record) => Some(record),
            CloseOutcome::Skipped(_) => None,
        }
    }
}

/// What the driver did with one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutcome {
    /// First tick ever: the open minute was initialised and the tick routed.
    Started { minute_start_ms: i64 },
    /// Tick folded into the open minute.
    Routed,
    /// Tick crossed a boundary: the previous minute was closed, then the
    /// tick was routed into the new one.
    Closed(MinuteClose),
    /// Tick belongs to an already closed minute and was dropped.
    /// `current_minute_ms` is the minute it was compared against.
    Late {
        tick_minute_ms: i64,
        current_minute_ms: i64,
    },
}

/// Counters kept by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStats {
    pub ticks_routed: u64,
    pub late_ticks: u64,
    pub minutes_scored: u64,
    pub minutes_skipped: u64,
    pub gap_minutes: u64,
}

/// Minute-boundary state machine for a single instrument.
pub struct MinuteDriver {
    market: MarketId,
    current_minute_ms: Option<i64>,
    /// Newest minute that was closed or discarded; survives discards.
    last_closed_minute_ms: Option<i64>,
    open_ticks: u64,
    quote: QuoteAccumulator,
    depth: DepthAccumulator,
    trades: TradeAccumulator,
    scorer: FactorScorer,
    stats: DriverStats,
}

impl MinuteDriver {
    pub fn new(market: MarketId, config: DriverConfig) -> Self {
        info!(
            market = %market,
            depth_levels = config.depth_levels,
            window_capacity = config.window_capacity,
            "MinuteDriver initialized"
        );

        Self {
            market,
            current_minute_ms: None,
            last_closed_minute_ms: None,
            open_ticks: 0,
            quote: QuoteAccumulator::new(),
            depth: DepthAccumulator::new(config.depth_levels),
            trades: TradeAccumulator::new(),
            scorer: FactorScorer::new(config.window_capacity),
            stats: DriverStats::default(),
        }
    }

    pub fn with_defaults(market: MarketId) -> Self {
        Self::new(market, DriverConfig::default())
    }

    /// Feed one tick through the state machine.
    pub fn process(&mut self, tick: &Tick) -> DriverOutcome {
        let tick_minute = tick.minute_start_ms();

        match self.current_minute_ms {
            None => {
                if let Some(closed) = self.last_closed_minute_ms.filter(|&c| tick_minute <= c) {
                    return self.drop_late(tick, tick_minute, closed);
                }
                self.current_minute_ms = Some(tick_minute);
                self.route(tick);
                debug!(market = %self.market, minute_start_ms = tick_minute, "First minute opened");
                DriverOutcome::Started {
                    minute_start_ms: tick_minute,
                }
            }
            Some(current) if tick_minute == current => {
                self.route(tick);
                DriverOutcome::Routed
            }
            Some(current) if tick_minute < current => self.drop_late(tick, tick_minute, current),
            Some(current) => {
                let close = self.close_minute(current, tick_minute);
                self.current_minute_ms = Some(tick_minute);
                self.route(tick);
                DriverOutcome::Closed(close)
            }
        }
    }

    /// Drop the in-flight minute without scoring it (shutdown path).
    ///
    /// The discarded minute counts as closed: later ticks for it, or for any
    /// earlier minute, are dropped as late. Returns the number of ticks
    /// discarded.
    pub fn discard_open_minute(&mut self) -> u64 {
        let discarded = self.open_ticks;
        self.quote.close();
        self.depth.close();
        self.trades.close();
        self.open_ticks = 0;
        if let Some(current) = self.current_minute_ms.take() {
            self.last_closed_minute_ms = Some(current);
        }

        if discarded > 0 {
            info!(market = %self.market, discarded, "Discarded open minute");
        }
        discarded
    }

    pub fn current_minute_ms(&self) -> Option<i64> {
        self.current_minute_ms
    }

    pub fn last_closed_minute_ms(&self) -> Option<i64> {
        self.last_closed_minute_ms
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn scorer(&self) -> &FactorScorer {
        &self.scorer
    }

    pub fn market(&self) -> &MarketId {
        &self.market
    }

    fn drop_late(&mut self, tick: &Tick, tick_minute: i64, against: i64) -> DriverOutcome {
        self.stats.late_ticks += 1;
        debug!(
            market = %self.market,
            stream = tick.kind().as_str(),
            tick_minute_ms = tick_minute,
            current_minute_ms = against,
            late_ticks = self.stats.late_ticks,
            "Dropping tick for closed minute"
        );
        DriverOutcome::Late {
            tick_minute_ms: tick_minute,
            current_minute_ms: against,
        }
    }

    fn route(&mut self, tick: &Tick) {
        let accepted = match &tick.payload {
            TickPayload::Quote { bid, ask } => self.quote.observe(bid.as_f64(), ask.as_f64()),
            TickPayload::Depth { bids, asks } => {
                self.depth.observe(bids, asks);
                true
            }
            TickPayload::Trade {
                price,
                quantity,
                is_taker_sell,
            } => self
                .trades
                .observe(price.as_f64(), quantity.as_f64(), *is_taker_sell),
        };

        if accepted {
            self.open_ticks += 1;
            self.stats.ticks_routed += 1;
        }
    }

    fn close_minute(&mut self, minute_start_ms: i64, next_minute_ms: i64) -> MinuteClose {
        let quote = self.quote.close();
        let depth = self.depth.close();
        let trade = self.trades.close();
        self.open_ticks = 0;
        self.last_closed_minute_ms = Some(minute_start_ms);

        let gap_minutes = ((next_minute_ms - minute_start_ms) / MINUTE_MS - 1).max(0);
        if gap_minutes > 0 {
            self.stats.gap_minutes += gap_minutes as u64;
            info!(
                market = %self.market,
                minute_start_ms,
                next_minute_ms,
                gap_minutes,
                "No ticks for skipped minutes"
            );
        }

        let outcome = match (quote, depth) {
            (Some(quote), Some(depth)) => {
                let (n_quotes, n_depth, n_trades) =
                    (quote.n_updates, depth.n_updates, trade.n_trades);
                let summary = MinuteSummary::merge(minute_start_ms, quote, depth, trade);
                let record = self.scorer.score(&summary);
                self.stats.minutes_scored += 1;

                info!(
                    market = %self.market,
                    minute_start_ms,
                    lhf = record.lhf,
                    cold = record.cold,
                    n_quotes,
                    n_depth,
                    n_trades,
                    "Minute closed"
                );
                CloseOutcome::Scored(record)
            }
            (quote, depth) => {
                let reason = match (quote.is_some(), depth.is_some()) {
                    (false, true) => SkipReason::MissingQuotes,
                    (true, false) => SkipReason::MissingDepth,
                    _ => SkipReason::MissingBoth,
                };
                self.stats.minutes_skipped += 1;
                info!(
                    market = %self.market,
                    minute_start_ms,
                    reason = ?reason,
                    "Minute skipped"
                );
                CloseOutcome::Skipped(reason)
            }
        };

        MinuteClose {
            minute_start_ms,
            outcome,
            gap_minutes,
        }
    }
}
