//! Types library for the liquidity factor engine
//!
//! Shared definitions for the market-data ticks consumed by the
//! minute-aggregation services, ensuring malformed exchange input is
//! rejected before it reaches any aggregation state.
//!
//! # Modules
//! - `ids`: Instrument identifier (MarketId)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `tick`: Tagged quote/depth/trade ticks
//! - `errors`: Tick rejection taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod tick;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::tick::*;
    pub use crate::errors::*;
}
