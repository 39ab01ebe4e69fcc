//! Binance USDⓈ-M futures REST snapshot client

use super::types::{BookLevel, Candle, ExchangeError, MarketSnapshot, OrderBookSnapshot};
use super::SnapshotSource;
use crate::config::{DetectionConfig, ExchangeConfig};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct DepthResponse {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestResponse {
    open_interest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumIndexResponse {
    last_funding_rate: String,
}

/// REST client fetching klines, depth, open interest and funding
pub struct BinanceRest {
    base_url: String,
    kline_interval: String,
    kline_limit: usize,
    depth_limit: usize,
    client: Client,
}

impl BinanceRest {
    pub fn new(exchange: &ExchangeConfig, detection: &DetectionConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(exchange.timeout())
            .build()
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        Ok(Self {
            base_url: exchange.rest_url.trim_end_matches('/').to_string(),
            kline_interval: detection.kline_interval.clone(),
            kline_limit: detection.kline_limit,
            depth_limit: exchange.depth_limit,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(url = %url, "Fetching");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| ExchangeError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExchangeError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.json().await.map_err(|e| ExchangeError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>, ExchangeError> {
        let rows: Vec<Vec<Value>> = self
            .get_json(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", self.kline_interval.clone()),
                    ("limit", self.kline_limit.to_string()),
                ],
            )
            .await?;
        Ok(parse_klines(&rows))
    }

    async fn fetch_book(&self, symbol: &str) -> Result<OrderBookSnapshot, ExchangeError> {
        let depth: DepthResponse = self
            .get_json(
                "/fapi/v1/depth",
                &[
                    ("symbol", symbol.to_string()),
                    ("limit", self.depth_limit.to_string()),
                ],
            )
            .await?;
        Ok(OrderBookSnapshot {
            bids: parse_levels(&depth.bids),
            asks: parse_levels(&depth.asks),
        })
    }

    async fn fetch_open_interest(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let oi: OpenInterestResponse = self
            .get_json("/fapi/v1/openInterest", &[("symbol", symbol.to_string())])
            .await?;
        parse_number("/fapi/v1/openInterest", &oi.open_interest)
    }

    async fn fetch_funding_rate(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let premium: PremiumIndexResponse = self
            .get_json("/fapi/v1/premiumIndex", &[("symbol", symbol.to_string())])
            .await?;
        parse_number("/fapi/v1/premiumIndex", &premium.last_funding_rate)
    }
}

#[async_trait]
impl SnapshotSource for BinanceRest {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, ExchangeError> {
        let (candles, book, oi, funding) = tokio::join!(
            self.fetch_candles(symbol),
            self.fetch_book(symbol),
            self.fetch_open_interest(symbol),
            self.fetch_funding_rate(symbol),
        );

        if candles.is_err() && book.is_err() && oi.is_err() && funding.is_err() {
            if let Err(e) = &candles {
                tracing::warn!(instrument = %symbol, error = %e, "All snapshot requests failed");
            }
            return Err(ExchangeError::Unavailable(symbol.to_string()));
        }

        let candles = candles.unwrap_or_else(|e| {
            tracing::warn!(instrument = %symbol, error = %e, "Klines unavailable");
            Vec::new()
        });

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            candles,
            book: ok_or_warn(symbol, "depth", book),
            open_interest: ok_or_warn(symbol, "open interest", oi),
            funding_rate: ok_or_warn(symbol, "funding rate", funding),
        })
    }
}

fn ok_or_warn<T>(symbol: &str, part: &str, res: Result<T, ExchangeError>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(instrument = %symbol, part, error = %e, "Snapshot part unavailable");
            None
        }
    }
}

fn parse_number(endpoint: &str, raw: &str) -> Result<f64, ExchangeError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExchangeError::Decode {
            endpoint: endpoint.to_string(),
            reason: format!("not a number: {raw}"),
        })
}

fn value_f64(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Parse `[openTime, open, high, low, close, volume, ...]` rows, skipping bad ones
fn parse_klines(rows: &[Vec<Value>]) -> Vec<Candle> {
    rows.iter()
        .filter_map(|row| {
            let open_time = Utc.timestamp_millis_opt(row.first()?.as_i64()?).single()?;
            Some(Candle {
                open_time,
                open: value_f64(row.get(1)?)?,
                high: value_f64(row.get(2)?)?,
                low: value_f64(row.get(3)?)?,
                close: value_f64(row.get(4)?)?,
                volume: value_f64(row.get(5)?)?,
            })
        })
        .collect()
}

fn parse_levels(raw: &[[String; 2]]) -> Vec<BookLevel> {
    raw.iter()
        .filter_map(|[p, q]| {
            Some(BookLevel::new(
                Decimal::from_str(p).ok()?,
                Decimal::from_str(q).ok()?,
            ))
        })
        .collect()
}
