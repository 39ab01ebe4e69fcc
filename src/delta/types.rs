//! Delta aggregation types

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Aggregation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Running counters since the current epoch start
    Realtime,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
}

impl WindowKind {
    /// Trailing window length, `None` for the realtime counters
    pub fn duration(self) -> Option<Duration> {
        match self {
            WindowKind::Realtime => None,
            WindowKind::FifteenMinutes => Some(Duration::minutes(15)),
            WindowKind::OneHour => Some(Duration::hours(1)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowKind::Realtime => "realtime",
            WindowKind::FifteenMinutes => "15m",
            WindowKind::OneHour => "1h",
        }
    }
}

/// Buy/sell volume split over some span of trades
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowCounter {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub trades: u64,
}

impl FlowCounter {
    pub fn record(&mut self, qty: f64, taker_buy: bool) {
        if taker_buy {
            self.buy_volume += qty;
        } else {
            self.sell_volume += qty;
        }
        self.trades += 1;
    }

    /// (buy − sell) / (buy + sell), 0 when nothing traded
    pub fn delta(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total > 0.0 && total.is_finite() {
            ((self.buy_volume - self.sell_volume) / total).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One computed window value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaSample {
    pub kind: WindowKind,
    /// In [-1, 1]
    pub raw_delta: f64,
    /// EMA of the retained raw samples, `None` only before the first sample
    pub smoothed_delta: Option<f64>,
    pub flow: FlowCounter,
    pub computed_at: DateTime<Utc>,
}

/// Latest delta view for one instrument
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeltaSnapshot {
    pub realtime: f64,
    pub fifteen_minutes: Option<f64>,
    pub one_hour: Option<f64>,
    pub buffered_trades: usize,
}

/// Rejected trade tick
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TickError {
    #[error("tick for {got} routed to {expected}")]
    InstrumentMismatch { expected: String, got: String },
    #[error("tick size {0} is not a positive finite number")]
    InvalidSize(Decimal),
}
