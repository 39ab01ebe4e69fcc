//! Order classification

use super::types::{OrderClass, Side, TrackedOrder};
use crate::config::OrderConfig;

/// Classify an order from its current lifecycle fields
///
/// Rules are checked in priority order and the first match wins:
/// spoof flag, sweep, defensive, high impact, unknown.
pub fn classify(order: &TrackedOrder, config: &OrderConfig) -> OrderClass {
    if order.is_spoof() {
        return OrderClass::Spoof;
    }

    // a consumed bid means sellers hit it, a consumed ask means buyers lifted it
    if order.was_consumed && order.fill_ratio() >= config.sweep_fill_ratio {
        return match order.side {
            Side::Bid => OrderClass::SweepSell,
            Side::Ask => OrderClass::SweepBuy,
        };
    }

    if order.is_persistent && !order.was_consumed {
        return match order.side {
            Side::Bid => OrderClass::DefensiveBuy,
            Side::Ask => OrderClass::DefensiveSell,
        };
    }

    if order.impact_ratio >= config.impact_ratio_threshold {
        let quick_cancel = order
            .lifetime()
            .is_some_and(|l| l < config.spoof_window());
        return if quick_cancel && !order.is_persistent {
            OrderClass::Spoof
        } else {
            OrderClass::Manipulation
        };
    }

    OrderClass::Unknown
}
