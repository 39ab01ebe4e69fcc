//! Order tracking types

use crate::integrator::Action;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Book side of a resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

/// Behavioural label for a tracked resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderClass {
    DefensiveBuy,
    DefensiveSell,
    SweepBuy,
    SweepSell,
    Spoof,
    Manipulation,
    #[default]
    Unknown,
}

/// A large resting order followed across book snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedOrder {
    pub instrument: String,
    pub side: Side,
    pub price: Decimal,
    /// Size currently resting
    pub qty: Decimal,
    /// Largest size observed while resting
    pub posted_qty: Decimal,
    pub posted_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub seen_count: u32,
    pub filled_volume_observed: Decimal,
    pub is_persistent: bool,
    pub was_consumed: bool,
    is_spoof: bool,
    /// Order notional over the notional of the top levels on its side
    pub impact_ratio: f64,
    pub classification: OrderClass,
}

impl TrackedOrder {
    pub fn new(
        instrument: impl Into<String>,
        side: Side,
        price: Decimal,
        qty: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            price,
            qty,
            posted_qty: qty,
            posted_at: now,
            last_seen_at: now,
            canceled_at: None,
            seen_count: 1,
            filled_volume_observed: Decimal::ZERO,
            is_persistent: false,
            was_consumed: false,
            is_spoof: false,
            impact_ratio: 0.0,
            classification: OrderClass::Unknown,
        }
    }

    pub fn is_spoof(&self) -> bool {
        self.is_spoof
    }

    /// Flag as spoof; the flag is never cleared
    pub fn mark_spoof(&mut self) {
        self.is_spoof = true;
    }

    pub fn is_live(&self) -> bool {
        self.canceled_at.is_none()
    }

    /// Observed fill as a fraction of posted size
    pub fn fill_ratio(&self) -> f64 {
        if self.posted_qty.is_zero() {
            return 0.0;
        }
        (self.filled_volume_observed / self.posted_qty)
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Time from posting to withdrawal, `None` while still resting
    pub fn lifetime(&self) -> Option<chrono::Duration> {
        self.canceled_at.map(|c| c - self.posted_at)
    }
}

/// Aggregate of recent classified orders for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSignal {
    pub action: Action,
    pub buy_score: f64,
    pub sell_score: f64,
    pub manipulation_score: f64,
    pub spoof_count: usize,
    pub manipulation_count: usize,
    pub tracked_count: usize,
}

impl Default for OrderSignal {
    fn default() -> Self {
        Self {
            action: Action::Unknown,
            buy_score: 0.0,
            sell_score: 0.0,
            manipulation_score: 0.0,
            spoof_count: 0,
            manipulation_count: 0,
            tracked_count: 0,
        }
    }
}

impl OrderSignal {
    /// buy + sell
    pub fn strength(&self) -> f64 {
        self.buy_score + self.sell_score
    }

    /// (buy − sell) / (buy + sell) in [-1, 1], 0 with no directional orders
    pub fn order_score(&self) -> f64 {
        let total = self.strength();
        if total > 0.0 {
            ((self.buy_score - self.sell_score) / total).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// |buy − sell| / (buy + sell)
    pub fn separation(&self) -> f64 {
        self.order_score().abs()
    }

    pub fn has_large_orders(&self) -> bool {
        self.tracked_count > 0
    }

    pub fn spoofing(&self) -> bool {
        self.spoof_count > 0
    }
}
