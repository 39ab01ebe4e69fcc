//! Market snapshot types

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Candle with every price at `close`
    pub fn flat(open_time: DateTime<Utc>, close: f64, volume: f64) -> Self {
        Self {
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }
}

/// A single price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, qty: Decimal) -> Self {
        Self { price, qty }
    }

    /// price × qty in quote currency
    pub fn notional(&self) -> f64 {
        (self.price * self.qty).to_f64().unwrap_or(0.0)
    }
}

/// Top-of-book depth snapshot, best levels first
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Top-N bid quantity minus top-N ask quantity
    pub fn imbalance(&self, top_n: usize) -> f64 {
        let sum = |levels: &[BookLevel]| -> Decimal {
            levels.iter().take(top_n).map(|l| l.qty).sum()
        };
        (sum(&self.bids) - sum(&self.asks)).to_f64().unwrap_or(0.0)
    }

    /// Mid price if both sides are populated
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.bids.first()?.price;
        let ask = self.asks.first()?.price;
        Some((bid + ask) / Decimal::TWO)
    }
}

/// Everything fetched for one instrument in one refresh
///
/// Each part is optional; a missing part is treated as neutral downstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Oldest first
    pub candles: Vec<Candle>,
    pub book: Option<OrderBookSnapshot>,
    pub open_interest: Option<f64>,
    pub funding_rate: Option<f64>,
}

impl MarketSnapshot {
    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    /// Reference price for notional sizing: book mid, else last close
    pub fn reference_price(&self) -> Option<f64> {
        self.book
            .as_ref()
            .and_then(|b| b.mid())
            .and_then(|m| m.to_f64())
            .or_else(|| self.last_close())
    }
}

/// Snapshot source errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Unexpected {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("Failed to decode {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("No snapshot data available for {0}")]
    Unavailable(String),
}
