//! Binance futures aggregated-trade feed

use super::{TradeFeed, TradeTick};
use crate::telemetry::{incr_counter, CounterMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Binance aggTrade message structure
#[derive(Debug, Deserialize)]
struct AggTradeMessage {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,
    /// Symbol
    #[serde(rename = "s")]
    symbol: String,
    /// Price
    #[serde(rename = "p")]
    price: String,
    /// Quantity
    #[serde(rename = "q")]
    quantity: String,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    trade_time: i64,
    /// Is the buyer the market maker
    #[serde(rename = "m")]
    buyer_maker: bool,
}

/// Result of parsing one stream frame
#[derive(Debug, PartialEq)]
enum Parsed {
    Tick(TradeTick),
    /// Not a trade frame (subscription acks, other events)
    Ignored,
    /// Trade frame with unusable fields
    Malformed,
}

/// Binance futures WebSocket feed for `<symbol>@aggTrade` streams
pub struct BinanceTradeFeed {
    base_url: String,
}

impl BinanceTradeFeed {
    /// Create a new feed against the given stream base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the WebSocket URL for the trade stream
    fn build_ws_url(&self, symbol: &str) -> String {
        format!("{}/{}@aggTrade", self.base_url, symbol.to_lowercase())
    }

    fn parse_message(msg: &str) -> Parsed {
        let trade: AggTradeMessage = match serde_json::from_str(msg) {
            Ok(t) => t,
            Err(_) => {
                return if msg.contains("\"aggTrade\"") {
                    Parsed::Malformed
                } else {
                    Parsed::Ignored
                };
            }
        };

        if trade.event_type != "aggTrade" {
            return Parsed::Ignored;
        }

        let price = Decimal::from_str(&trade.price).ok();
        let qty = Decimal::from_str(&trade.quantity).ok();
        let time = Utc.timestamp_millis_opt(trade.trade_time).single();

        match (price, qty, time) {
            (Some(price), Some(qty), Some(time)) => Parsed::Tick(TradeTick {
                symbol: trade.symbol,
                price,
                qty,
                time,
                is_buyer_maker: trade.buyer_maker,
            }),
            _ => Parsed::Malformed,
        }
    }

    /// Run the message processing loop
    async fn run_message_loop(
        symbol: String,
        mut ws_rx: mpsc::Receiver<WsMessage>,
        tick_tx: mpsc::Sender<TradeTick>,
    ) {
        while let Some(msg) = ws_rx.recv().await {
            match msg {
                WsMessage::Text(text) => match Self::parse_message(&text) {
                    Parsed::Tick(tick) => {
                        if tick_tx.send(tick).await.is_err() {
                            tracing::debug!(instrument = %symbol, "Tick receiver dropped, stopping feed");
                            break;
                        }
                    }
                    Parsed::Malformed => {
                        incr_counter(CounterMetric::TicksDropped, &symbol);
                        tracing::debug!(instrument = %symbol, "Dropping malformed trade frame");
                    }
                    Parsed::Ignored => {}
                },
                WsMessage::Connected => {
                    tracing::info!(instrument = %symbol, "Binance trade feed connected");
                }
                WsMessage::Disconnected => {
                    tracing::warn!(instrument = %symbol, "Binance trade feed disconnected");
                    break;
                }
                WsMessage::Reconnecting { attempt } => {
                    tracing::warn!(instrument = %symbol, attempt, "Binance trade feed reconnecting...");
                }
                WsMessage::Binary(_) => {}
            }
        }
    }
}

impl Default for BinanceTradeFeed {
    fn default() -> Self {
        Self::new("wss://fstream.binance.com/ws")
    }
}

#[async_trait]
impl TradeFeed for BinanceTradeFeed {
    async fn subscribe(
        &self,
        symbol: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<mpsc::Receiver<TradeTick>> {
        let (tick_tx, tick_rx) = mpsc::channel(4096);
        let url = self.build_ws_url(symbol);

        tracing::info!(instrument = %symbol, %url, "Subscribing to Binance trade feed");

        let config = WsConfig::new(url)
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .ping_interval(Duration::from_secs(30));

        let ws_rx = WsClient::new(config).connect(shutdown);

        let symbol = symbol.to_string();
        tokio::spawn(async move {
            Self::run_message_loop(symbol, ws_rx, tick_tx).await;
        });

        Ok(tick_rx)
    }
}
