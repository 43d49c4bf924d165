//! Exchange feed adapter
//!
//! Connects to the Binance USDT-M combined stream for one symbol and turns
//! `bookTicker`, `depth<N>@100ms` and `aggTrade` frames into [`Tick`]s on the
//! single ordered tick queue. The connection is retried forever after a
//! fixed delay until shutdown is signalled or the queue consumer is gone.
//!
//! A full tick queue stalls the socket reader rather than dropping ticks.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use types::ids::MarketId;
use types::numeric::{Price, Quantity};
use types::tick::{Level, Tick};

use crate::metrics::ServiceMetrics;

/// Queue waits longer than this are logged once per tick.
const SLOW_SEND_WARN: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to decode stream frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connection settings for the feed task.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
}

/// Combined-stream URL for the three streams of `market`.
pub fn combined_stream_url(base: &str, market: &MarketId, depth_levels: usize) -> String {
    let sym = market.stream_prefix();
    format!(
        "{}?streams={sym}@aggTrade/{sym}@bookTicker/{sym}@depth{depth_levels}@100ms",
        base.trim_end_matches('/')
    )
}

#[derive(Debug, Deserialize)]
struct CombinedFrame {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BookTickerData {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    #[serde(rename = "b")]
    bid: Price,
    #[serde(rename = "a")]
    ask: Price,
}

#[derive(Debug, Deserialize)]
struct AggTradeData {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    #[serde(rename = "p")]
    price: Price,
    #[serde(rename = "q")]
    quantity: Quantity,
    /// Buyer is maker: the taker sold.
    #[serde(rename = "m")]
    buyer_is_maker: bool,
}

#[derive(Debug, Deserialize)]
struct DepthData {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    #[serde(rename = "b", default)]
    bids: Vec<(Price, Quantity)>,
    #[serde(rename = "a", default)]
    asks: Vec<(Price, Quantity)>,
}

fn levels(raw: Vec<(Price, Quantity)>) -> Vec<Level> {
    raw.into_iter().map(|(p, q)| Level::new(p, q)).collect()
}

/// Decode one combined-stream text frame.
///
/// Frames for other streams, and depth frames with an empty side, decode to
/// `Ok(None)`. Frames without an event time are stamped with
/// `received_at_ms`.
pub fn decode_message(text: &str, received_at_ms: i64) -> Result<Option<Tick>, FeedError> {
    let frame: CombinedFrame = serde_json::from_str(text)?;

    if frame.stream.ends_with("@bookTicker") {
        let data: BookTickerData = serde_json::from_value(frame.data)?;
        let ts = data.event_time.unwrap_or(received_at_ms);
        return Ok(Some(Tick::quote(ts, data.bid, data.ask)));
    }

    if frame.stream.ends_with("@aggTrade") {
        let data: AggTradeData = serde_json::from_value(frame.data)?;
        let ts = data.event_time.unwrap_or(received_at_ms);
        return Ok(Some(Tick::trade(
            ts,
            data.price,
            data.quantity,
            data.buyer_is_maker,
        )));
    }

    if frame.stream.contains("@depth") {
        let data: DepthData = serde_json::from_value(frame.data)?;
        if data.bids.is_empty() || data.asks.is_empty() {
            return Ok(None);
        }
        let ts = data.event_time.unwrap_or(received_at_ms);
        return Ok(Some(Tick::depth(ts, levels(data.bids), levels(data.asks))));
    }

    Ok(None)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Debug, PartialEq, Eq)]
enum Forward {
    Sent,
    Shutdown,
    QueueClosed,
}

/// Push one tick into the ordered queue, waiting for capacity.
async fn forward_tick(
    tx: &mpsc::Sender<Tick>,
    tick: Tick,
    shutdown: &mut watch::Receiver<bool>,
) -> Forward {
    let send = tx.send(tick);
    tokio::pin!(send);
    let slow = tokio::time::sleep(SLOW_SEND_WARN);
    tokio::pin!(slow);
    let mut warned = false;

    loop {
        tokio::select! {
            res = &mut send => {
                return match res {
                    Ok(()) => Forward::Sent,
                    Err(_) => Forward::QueueClosed,
                };
            }
            _ = shutdown.changed() => return Forward::Shutdown,
            _ = &mut slow, if !warned => {
                warned = true;
                warn!(
                    waited_ms = SLOW_SEND_WARN.as_millis() as u64,
                    "Tick queue full, feed reader stalled"
                );
            }
        }
    }
}

enum SessionEnd {
    Shutdown,
    QueueClosed,
    Disconnected,
}

/// Feed loop: connect, stream, reconnect after `reconnect_delay`.
pub async fn run_feed(
    config: FeedConfig,
    tx: mpsc::Sender<Tick>,
    metrics: Arc<ServiceMetrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(url = %config.url, "Starting market data feed");

    loop {
        if *shutdown.borrow() {
            break;
        }

        match stream_session(&config, &tx, &metrics, &mut shutdown).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::QueueClosed) => {
                info!("Tick queue closed, stopping feed");
                break;
            }
            Ok(SessionEnd::Disconnected) => {
                warn!(
                    retry_in_ms = config.reconnect_delay.as_millis() as u64,
                    "Stream disconnected"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    retry_in_ms = config.reconnect_delay.as_millis() as u64,
                    "Stream error"
                );
            }
        }

        metrics.record_reconnect();
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Market data feed stopped");
}

async fn stream_session(
    config: &FeedConfig,
    tx: &mpsc::Sender<Tick>,
    metrics: &ServiceMetrics,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, FeedError> {
    let (ws, _) = connect_async(config.url.as_str()).await?;
    info!(url = %config.url, "Connected to market data stream");

    let (mut write, mut read) = ws.split();
    let mut ping = tokio::time::interval(config.ping_interval);
    // First tick completes immediately.
    ping.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            _ = ping.tick() => {
                write.send(Message::Ping(Default::default())).await?;
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match decode_message(&text, now_ms()) {
                    Ok(Some(tick)) => match forward_tick(tx, tick, shutdown).await {
                        Forward::Sent => {}
                        Forward::Shutdown => {
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(SessionEnd::Shutdown);
                        }
                        Forward::QueueClosed => return Ok(SessionEnd::QueueClosed),
                    },
                    Ok(None) => {}
                    Err(e) => {
                        metrics.record_decode_error();
                        debug!(error = %e, "Skipping undecodable frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Server closed stream");
                    return Ok(SessionEnd::Disconnected);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Disconnected),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use types::tick::{StreamKind, TickPayload};

    fn quote(ts: i64) -> Tick {
        Tick::quote(ts, Price::from_str("100").unwrap(), Price::from_str("100.1").unwrap())
    }

    #[test]
    fn test_combined_stream_url() {
        let url = combined_stream_url(
            "wss://fstream.binance.com/stream/",
            &MarketId::new("BTCUSDT"),
            10,
        );
        assert_eq!(
            url,
            "wss://fstream.binance.com/stream?streams=btcusdt@aggTrade/btcusdt@bookTicker/btcusdt@depth10@100ms"
        );
    }

    #[test]
    fn test_decode_book_ticker() {
        let text = r#"{"stream":"btcusdt@bookTicker","data":{"e":"bookTicker","u":400900217,"E":1568014460893,"T":1568014460891,"s":"BTCUSDT","b":"25.35190000","B":"31.21000000","a":"25.36520000","A":"40.66000000"}}"#;
        let tick = decode_message(text, 0).unwrap().unwrap();

        assert_eq!(tick.event_time_ms, 1568014460893);
        assert_eq!(
            tick.payload,
            TickPayload::Quote {
                bid: Price::from_str("25.3519").unwrap(),
                ask: Price::from_str("25.3652").unwrap(),
            }
        );
    }

    #[test]
    fn test_decode_agg_trade_taker_side() {
        let text = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","E":123456789,"s":"BTCUSDT","a":5933014,"p":"0.001","q":"100","f":100,"l":105,"T":123456785,"m":true}}"#;
        let tick = decode_message(text, 0).unwrap().unwrap();

        assert_eq!(tick.kind(), StreamKind::Trade);
        match tick.payload {
            TickPayload::Trade {
                price,
                quantity,
                is_taker_sell,
            } => {
                assert_eq!(price, Price::from_str("0.001").unwrap());
                assert_eq!(quantity, Quantity::from_str("100").unwrap());
                assert!(is_taker_sell);
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_depth_levels() {
        let text = r#"{"stream":"btcusdt@depth10@100ms","data":{"e":"depthUpdate","E":1571889248277,"T":1571889248276,"s":"BTCUSDT","U":390497796,"u":390497878,"pu":390497794,"b":[["7403.89","0.002"],["7403.90","3.906"]],"a":[["7405.96","3.340"]]}}"#;
        let tick = decode_message(text, 0).unwrap().unwrap();

        match tick.payload {
            TickPayload::Depth { bids, asks } => {
                assert_eq!(bids.len(), 2);
                assert_eq!(asks.len(), 1);
                assert_eq!(bids[1].price, Price::from_str("7403.90").unwrap());
                assert_eq!(asks[0].quantity, Quantity::from_str("3.340").unwrap());
            }
            other => panic!("expected depth, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_event_time_uses_receipt_time() {
        let text = r#"{"stream":"btcusdt@bookTicker","data":{"b":"100","a":"101"}}"#;
        let tick = decode_message(text, 1_700_000_000_123).unwrap().unwrap();
        assert_eq!(tick.event_time_ms, 1_700_000_000_123);
    }

    #[test]
    fn test_depth_with_empty_side_ignored() {
        let text = r#"{"stream":"btcusdt@depth10@100ms","data":{"E":1,"b":[["100","1"]],"a":[]}}"#;
        assert!(decode_message(text, 0).unwrap().is_none());
    }

    #[test]
    fn test_unknown_stream_ignored() {
        let text = r#"{"stream":"btcusdt@markPrice","data":{"E":1,"p":"100"}}"#;
        assert!(decode_message(text, 0).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_waits_instead_of_dropping() {
        let (tx, mut rx) = mpsc::channel(1);
        let (_shutdown_tx, mut shutdown) = watch::channel(false);
        tx.send(quote(1)).await.unwrap();

        let pending = tokio::spawn(async move { forward_tick(&tx, quote(2), &mut shutdown).await });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        assert_eq!(rx.recv().await.unwrap().event_time_ms, 1);
        assert_eq!(pending.await.unwrap(), Forward::Sent);
        assert_eq!(rx.recv().await.unwrap().event_time_ms, 2);
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_send() {
        let (tx, _rx) = mpsc::channel(1);
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        tx.send(quote(1)).await.unwrap();

        let pending = tokio::spawn(async move { forward_tick(&tx, quote(2), &mut shutdown).await });
        tokio::task::yield_now().await;
        shutdown_tx.send(true).unwrap();

        assert_eq!(pending.await.unwrap(), Forward::Shutdown);
    }

    #[tokio::test]
    async fn test_closed_queue_stops_forwarding() {
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, mut shutdown) = watch::channel(false);
        drop(rx);

        assert_eq!(
            forward_tick(&tx, quote(1), &mut shutdown).await,
            Forward::QueueClosed
        );
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(matches!(
            decode_message("not json", 0),
            Err(FeedError::Decode(_))
        ));

        let negative = r#"{"stream":"btcusdt@aggTrade","data":{"E":1,"p":"-5","q":"1","m":false}}"#;
        assert!(matches!(
            decode_message(negative, 0),
            Err(FeedError::Decode(_))
        ));
    }
}
