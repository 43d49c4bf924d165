//! Error types for market-data ticks
//!
//! Malformed input is rejected at the boundary, before it can reach any
//! minute accumulator.

use thiserror::Error;

/// Reasons a tick is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Crossed quote: bid {bid} above ask {ask}")]
    CrossedQuote { bid: String, ask: String },

    #[error("Empty depth side: {side}")]
    EmptyDepthSide { side: &'static str },

    #[error("Invalid event time: {0}")]
    InvalidTimestamp(i64),

    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),
}
