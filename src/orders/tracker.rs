//! Large resting order lifecycle tracking

use super::classifier::classify;
use super::types::{OrderClass, OrderSignal, Side, TrackedOrder};
use crate::config::OrderConfig;
use crate::exchange::{BookLevel, OrderBookSnapshot};
use crate::feed::TradeTick;
use crate::integrator::Action;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

type OrderKey = (Side, Decimal);

/// Follows large levels across book snapshots for one instrument
#[derive(Debug, Clone)]
pub struct OrderTracker {
    instrument: String,
    config: OrderConfig,
    top_n: usize,
    orders: HashMap<OrderKey, TrackedOrder>,
}

impl OrderTracker {
    /// `top_n` is the number of levels per side used for impact ratios
    pub fn new(instrument: impl Into<String>, config: OrderConfig, top_n: usize) -> Self {
        Self {
            instrument: instrument.into(),
            config,
            top_n: top_n.max(1),
            orders: HashMap::new(),
        }
    }

    pub fn with_defaults(instrument: impl Into<String>) -> Self {
        Self::new(instrument, OrderConfig::default(), 20)
    }

    /// Apply a book snapshot, returning how many new orders started being tracked
    pub fn update(
        &mut self,
        book: &OrderBookSnapshot,
        reference_price: f64,
        now: DateTime<Utc>,
    ) -> usize {
        let mut present: HashSet<OrderKey> = HashSet::new();
        let mut added = 0;

        for (side, levels) in [(Side::Bid, &book.bids), (Side::Ask, &book.asks)] {
            let side_notional: f64 = levels.iter().take(self.top_n).map(BookLevel::notional).sum();

            let large: Vec<&BookLevel> = levels
                .iter()
                .filter(|l| self.is_large(l, reference_price))
                .collect();

            for level in large {
                let key = (side, level.price.normalize());
                if !present.insert(key) {
                    continue;
                }
                let impact = if side_notional > 0.0 {
                    level.notional() / side_notional
                } else {
                    0.0
                };

                match self.orders.get_mut(&key) {
                    Some(order) if order.is_live() => {
                        order.seen_count += 1;
                        order.qty = level.qty;
                        order.posted_qty = order.posted_qty.max(level.qty);
                        order.last_seen_at = now;
                        order.impact_ratio = impact;
                        if order.seen_count >= self.config.persist_snapshots {
                            order.is_persistent = true;
                        }
                    }
                    _ => {
                        let mut order =
                            TrackedOrder::new(&self.instrument, side, level.price, level.qty, now);
                        order.impact_ratio = impact;
                        order.is_persistent = self.config.persist_snapshots <= 1;
                        self.orders.insert(key, order);
                        added += 1;
                    }
                }
            }
        }

        let spoof_window = self.config.spoof_window();
        for (key, order) in self.orders.iter_mut() {
            if !order.is_live() || present.contains(key) {
                continue;
            }
            order.canceled_at = Some(now);
            let quick = now - order.posted_at < spoof_window;
            if quick && !order.is_persistent && order.fill_ratio() < self.config.sweep_fill_ratio {
                order.mark_spoof();
                tracing::debug!(
                    instrument = %self.instrument,
                    side = ?order.side,
                    price = %order.price,
                    "Large order withdrawn quickly, flagged as spoof"
                );
            }
        }

        self.retire(now);
        self.reclassify();
        added
    }

    fn is_large(&self, level: &BookLevel, reference_price: f64) -> bool {
        let qty = level.qty.to_f64().unwrap_or(0.0);
        qty * reference_price >= self.config.large_order_notional
    }

    /// Attribute a trade to the closest live tracked order near its price
    ///
    /// Buyer-maker trades hit bids, taker buys lift asks. Returns whether an
    /// order absorbed the trade.
    pub fn mark_consumed(&mut self, tick: &TradeTick) -> bool {
        let side = if tick.is_buyer_maker { Side::Bid } else { Side::Ask };
        let tolerance = Decimal::from_f64(self.config.price_tolerance).unwrap_or(Decimal::ZERO);

        let matched = self
            .orders
            .values_mut()
            .filter(|o| o.is_live() && o.side == side && !o.price.is_zero())
            .map(|o| ((tick.price - o.price).abs() / o.price, o))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by(|a, b| a.0.cmp(&b.0).then(a.1.price.cmp(&b.1.price)))
            .map(|(_, o)| o);

        match matched {
            Some(order) => {
                order.filled_volume_observed += tick.qty;
                order.was_consumed = true;
                order.classification = classify(order, &self.config);
                true
            }
            None => false,
        }
    }

    fn retire(&mut self, now: DateTime<Utc>) {
        let retire_after = self.config.retire_after();
        self.orders
            .retain(|_, o| o.canceled_at.map_or(true, |c| now - c <= retire_after));

        if self.orders.len() > self.config.max_tracked {
            let mut by_recency: Vec<(OrderKey, DateTime<Utc>)> = self
                .orders
                .iter()
                .map(|(k, o)| (*k, o.last_seen_at))
                .collect();
            by_recency.sort_by(|a, b| b.1.cmp(&a.1));
            for (key, _) in by_recency.into_iter().skip(self.config.max_tracked) {
                self.orders.remove(&key);
            }
        }
    }

    fn reclassify(&mut self) {
        for order in self.orders.values_mut() {
            order.classification = classify(order, &self.config);
        }
    }

    /// Aggregate orders seen within the signal window into an [`OrderSignal`]
    pub fn signal(&self, now: DateTime<Utc>) -> OrderSignal {
        let window = self.config.signal_window();
        let mut signal = OrderSignal::default();
        let mut sweep_buy = 0.0;
        let mut defensive_buy = 0.0;
        let mut sweep_sell = 0.0;
        let mut defensive_sell = 0.0;

        for order in self.orders.values().filter(|o| now - o.last_seen_at <= window) {
            signal.tracked_count += 1;
            let weight = 1.0 + 4.0 * order.impact_ratio.clamp(0.0, 1.0);
            match order.classification {
                OrderClass::DefensiveBuy => defensive_buy += weight,
                OrderClass::SweepBuy => sweep_buy += weight,
                OrderClass::DefensiveSell => defensive_sell += weight,
                OrderClass::SweepSell => sweep_sell += weight,
                OrderClass::Spoof => {
                    signal.spoof_count += 1;
                    signal.manipulation_score += weight;
                }
                OrderClass::Manipulation => {
                    signal.manipulation_count += 1;
                    signal.manipulation_score += weight;
                }
                OrderClass::Unknown => {}
            }
        }

        signal.buy_score = sweep_buy + defensive_buy;
        signal.sell_score = sweep_sell + defensive_sell;
        let dominance = self.config.dominance_ratio;

        signal.action = if signal.tracked_count == 0 {
            Action::Unknown
        } else if signal.manipulation_score > 0.0 && signal.manipulation_score >= signal.strength() {
            Action::Manipulation
        } else if signal.buy_score > 0.0 && signal.buy_score >= dominance * signal.sell_score {
            if sweep_buy > defensive_buy {
                Action::Markup
            } else {
                Action::Accumulate
            }
        } else if signal.sell_score > 0.0 && signal.sell_score >= dominance * signal.buy_score {
            if sweep_sell > defensive_sell {
                Action::Markdown
            } else {
                Action::Distribution
            }
        } else {
            Action::Unknown
        };

        signal
    }

    pub fn get(&self, side: Side, price: Decimal) -> Option<&TrackedOrder> {
        self.orders.get(&(side, price.normalize()))
    }

    pub fn orders(&self) -> impl Iterator<Item = &TrackedOrder> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
