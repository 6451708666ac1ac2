use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Error, MarketEvent, OrderBook, Result};

use super::rest::parse_levels;

/// Binance partial-depth + trade WebSocket stream for a single pair.
///
/// Connects to the combined `<pair>@depth<N>@100ms` / `<pair>@trade` stream,
/// parses events into `MarketEvent`, and publishes them on a broadcast
/// channel. Reconnects automatically with exponential backoff.
pub struct BinanceStream {
    pair: String,
    depth: usize,
    ws_url: String,
    market_tx: broadcast::Sender<MarketEvent>,
}

impl BinanceStream {
    pub fn new(
        pair: impl Into<String>,
        depth: usize,
        ws_url: impl Into<String>,
        market_tx: broadcast::Sender<MarketEvent>,
    ) -> Self {
        Self {
            pair: pair.into(),
            depth: stream_depth(depth),
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            market_tx,
        }
    }

    /// Run the stream loop forever, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(pair = %self.pair, "Connecting to Binance WebSocket stream");
            match self.connect_once().await {
                Ok(()) => {
                    info!(pair = %self.pair, "WebSocket stream closed cleanly");
                    // Binance ends sessions after 24h
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(
                        pair = %self.pair,
                        error = %e,
                        backoff = ?backoff,
                        "WebSocket error, reconnecting"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    fn url(&self) -> Result<Url> {
        let pair_lower = self.pair.to_lowercase();
        let url_str = format!(
            "{}/stream?streams={pair_lower}@depth{}@100ms/{pair_lower}@trade",
            self.ws_url, self.depth
        );
        Url::parse(&url_str).map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn connect_once(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(self.url()?)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_stream_message(&self.pair, &text) {
                    Ok(Some(event)) => {
                        // Ignore send errors (no active receivers)
                        let _ = self.market_tx.send(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(pair = %self.pair, error = %e, "Failed to parse stream event");
                    }
                }
            }
        }

        Ok(())
    }
}

/// Partial depth streams exist for 5, 10 and 20 levels only.
fn stream_depth(depth: usize) -> usize {
    match depth {
        0..=5 => 5,
        6..=10 => 10,
        _ => 20,
    }
}

// ─── Binance combined stream JSON parsing ────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    stream: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct PartialDepth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Deserialize)]
struct Trade {
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

fn parse_stream_message(pair: &str, text: &str) -> Result<Option<MarketEvent>> {
    let envelope: Envelope = serde_json::from_str(text)?;

    if envelope.stream.ends_with("@trade") {
        let trade: Trade = serde_json::from_value(envelope.data)?;
        let timestamp: DateTime<Utc> = Utc
            .timestamp_millis_opt(trade.trade_time_ms)
            .single()
            .unwrap_or_else(Utc::now);
        return Ok(Some(MarketEvent::Trade {
            pair: pair.to_string(),
            price: Error::parse_f64("trade price", &trade.price)?,
            timestamp,
        }));
    }

    if envelope.stream.contains("@depth") {
        let depth: PartialDepth = serde_json::from_value(envelope.data)?;
        return Ok(Some(MarketEvent::Book {
            pair: pair.to_string(),
            book: OrderBook {
                bids: parse_levels(&depth.bids)?,
                asks: parse_levels(&depth.asks)?,
            },
        }));
    }

    Ok(None)
}
