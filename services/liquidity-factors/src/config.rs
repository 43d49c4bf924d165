//! Service configuration
//!
//! Defaults cover the common BTCUSDT deployment; every field can be
//! overridden from `LIQ_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use types::ids::MarketId;

use crate::depth::DEFAULT_DEPTH_LEVELS;
use crate::driver::DriverConfig;
use crate::emission::DEFAULT_EMIT_QUEUE;
use crate::feed::{combined_stream_url, FeedConfig};
use crate::window::DEFAULT_WINDOW_CAPACITY;

pub const DEFAULT_WS_BASE: &str = "wss://fstream.binance.com/stream";
pub const DEFAULT_TICK_QUEUE: usize = 100_000;

/// Partial-book depth levels the exchange publishes.
const SUPPORTED_DEPTH_LEVELS: [usize; 3] = [5, 10, 20];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub market: MarketId,
    pub ws_base: String,
    pub depth_levels: usize,
    pub window_capacity: usize,
    pub tick_queue: usize,
    pub emit_queue: usize,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    /// Status server bind address; disabled when `None`.
    pub http_addr: Option<SocketAddr>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            market: MarketId::new("BTCUSDT"),
            ws_base: DEFAULT_WS_BASE.to_string(),
            depth_levels: DEFAULT_DEPTH_LEVELS,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            tick_queue: DEFAULT_TICK_QUEUE,
            emit_queue: DEFAULT_EMIT_QUEUE,
            reconnect_delay: Duration::from_secs(3),
            ping_interval: Duration::from_secs(20),
            http_addr: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("LIQ_SYMBOL") {
            config.market = MarketId::try_new(value.as_str()).ok_or(ConfigError::Invalid {
                key: "LIQ_SYMBOL",
                value,
            })?;
        }
        if let Some(value) = lookup("LIQ_WS_BASE") {
            if !(value.starts_with("ws://") || value.starts_with("wss://")) {
                return Err(ConfigError::Invalid {
                    key: "LIQ_WS_BASE",
                    value,
                });
            }
            config.ws_base = value;
        }
        if let Some(levels) = parse(&lookup, "LIQ_DEPTH_LEVELS")? {
            if !SUPPORTED_DEPTH_LEVELS.contains(&levels) {
                return Err(ConfigError::Invalid {
                    key: "LIQ_DEPTH_LEVELS",
                    value: levels.to_string(),
                });
            }
            config.depth_levels = levels;
        }
        if let Some(n) = parse_positive(&lookup, "LIQ_WINDOW")? {
            config.window_capacity = n;
        }
        if let Some(n) = parse_positive(&lookup, "LIQ_TICK_QUEUE")? {
            config.tick_queue = n;
        }
        if let Some(n) = parse_positive(&lookup, "LIQ_EMIT_QUEUE")? {
            config.emit_queue = n;
        }
        if let Some(secs) = parse_positive::<_, u64>(&lookup, "LIQ_RECONNECT_SECS")? {
            config.reconnect_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive::<_, u64>(&lookup, "LIQ_PING_SECS")? {
            config.ping_interval = Duration::from_secs(secs);
        }
        if let Some(addr) = parse(&lookup, "LIQ_HTTP_ADDR")? {
            config.http_addr = Some(addr);
        }

        Ok(config)
    }

    pub fn stream_url(&self) -> String {
        combined_stream_url(&self.ws_base, &self.market, self.depth_levels)
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            url: self.stream_url(),
            reconnect_delay: self.reconnect_delay,
            ping_interval: self.ping_interval,
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            depth_levels: self.depth_levels,
            window_capacity: self.window_capacity,
        }
    }
}

fn parse<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_positive<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default + ToString,
{
    match parse::<F, T>(lookup, key)? {
        Some(n) if n <= T::default() => Err(ConfigError::Invalid {
            key,
            value: n.to_string(),
        }),
        other => Ok(other),
    }
}
