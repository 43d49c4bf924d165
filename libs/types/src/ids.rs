//! Instrument identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::TickError;

/// Exchange symbol of a single instrument (e.g. `BTCUSDT`).
///
/// Stored upper case; exchanges that key streams by lower-case symbol use
/// [`MarketId::stream_prefix`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the symbol is empty or contains non-alphanumeric characters
    pub fn new(symbol: impl Into<String>) -> Self {
        Self::try_new(symbol).expect("MarketId must be a non-empty alphanumeric symbol")
    }

    /// Try to create a MarketId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some(Self(s.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream names (`btcusdt@bookTicker`)
    pub fn stream_prefix(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl TryFrom<String> for MarketId {
    type Error = TickError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match Self::try_new(value.as_str()) {
            Some(market) => Ok(market),
            None => Err(TickError::InvalidSymbol(value)),
        }
    }
}

impl From<MarketId> for String {
    fn from(market: MarketId) -> Self {
        market.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
