//! Trade feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single executed trade from an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Trade price
    pub price: Decimal,
    /// Trade size in base units
    pub qty: Decimal,
    /// Exchange trade time
    pub time: DateTime<Utc>,
    /// True when the buyer was the resting side, i.e. the aggressor sold
    pub is_buyer_maker: bool,
}

impl TradeTick {
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        qty: Decimal,
        time: DateTime<Utc>,
        is_buyer_maker: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            qty,
            time,
            is_buyer_maker,
        }
    }

    /// Aggressor bought (lifted the ask)
    pub fn is_taker_buy(&self) -> bool {
        !self.is_buyer_maker
    }
}
