//! Liquidity Factor Service
//!
//! Consumes quote, depth and trade streams for one instrument and produces
//! one score record per elapsed minute:
//! - Per-minute spread, depth and order-flow summaries
//! - Robust z-scores against a rolling 30-minute history
//! - LHF (liquidity health) and COLD (fragility) factors on a 0-100 scale
//!
//! # Architecture
//!
//! ```text
//!   Exchange WebSocket
//!          │
//!      ┌───▼───┐
//!      │ Feed  │  ← Decodes frames into ticks
//!      └───┬───┘
//!      ┌───▼───┐
//!      │Ingest │  ← Rejects malformed ticks
//!      └───┬───┘
//!      ┌───▼────┐
//!      │ Driver │  ← Minute boundaries
//!      └───┬────┘
//!   ┌──────┼───────┐
//! ┌─▼───┐┌─▼───┐┌──▼───┐
//! │Quote││Depth││Trades│
//! └─┬───┘└─┬───┘└──┬───┘
//!   └──────┼───────┘
//!      ┌───▼────┐     ┌────────┐
//!      │Scoring │◀───▶│ Window │
//!      └───┬────┘     └────────┘
//!      ┌───▼────┐
//!      │ Emit   │  → JSON lines, status endpoint
//!      └────────┘
//! ```

pub mod config;
pub mod depth;
pub mod driver;
pub mod emission;
pub mod feed;
pub mod ingestion;
pub mod metrics;
pub mod quote;
pub mod record;
pub mod scoring;
pub mod service;
pub mod stats;
pub mod status;
pub mod trades;
pub mod window;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
