//! Weighted fusion of the order signal and indicator z-scores

use super::types::{
    clamp_confidence, Action, IntegratedSignal, SignalComponents, SignalSource,
};
use crate::config::{DetectionConfig, OrderConfig, Thresholds, Weights};
use crate::indicators::{Direction, IndicatorSnapshot};
use crate::orders::OrderSignal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const AGREEMENT_BOOST: f64 = 1.3;
const CONFLICT_CONFIDENCE: f64 = 0.45;
const BONUS: f64 = 0.05;

/// Non-finite inputs count as neutral
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Stateless fusion rule shared by all instruments
#[derive(Debug, Clone)]
pub struct SignalIntegrator {
    weights: Weights,
    thresholds: Thresholds,
    contradiction_score: f64,
    strong_order_strength: f64,
    separation_boost_ratio: f64,
}

impl SignalIntegrator {
    pub fn new(detection: &DetectionConfig, orders: &OrderConfig) -> Self {
        Self {
            weights: detection.weights,
            thresholds: detection.thresholds,
            contradiction_score: detection.contradiction_score,
            strong_order_strength: orders.strong_order_strength,
            separation_boost_ratio: orders.separation_boost_ratio,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&DetectionConfig::default(), &OrderConfig::default())
    }

    /// w_order·orderScore + w_cvd·cvdZ + w_oi·oiZ + w_delta·deltaZ
    pub fn smart_score(&self, order_score: f64, cvd_z: f64, oi_z: f64, delta_z: f64) -> f64 {
        let w = &self.weights;
        let score = w.order * finite_or_zero(order_score)
            + w.cvd * finite_or_zero(cvd_z)
            + w.oi * finite_or_zero(oi_z)
            + w.delta * finite_or_zero(delta_z);
        finite_or_zero(score)
    }

    /// Four-quadrant rule over price, CVD and OI direction
    pub fn quadrant(&self, indicators: &IndicatorSnapshot) -> Action {
        if !indicators.data_sufficient {
            return Action::Unknown;
        }
        let cvd = Direction::from_z(finite_or_zero(indicators.cvd_z), self.thresholds.cvd_z);
        let oi = Direction::from_z(finite_or_zero(indicators.oi_z), self.thresholds.oi_z);

        use Direction::*;
        match (indicators.price_direction, cvd, oi) {
            (Rising, Rising, Rising) => Action::Markup,
            (Flat | Falling, Rising, Rising) => Action::Accumulate,
            (Flat | Rising, Falling, Rising) => Action::Distribution,
            (Falling, Falling, Falling) => Action::Markdown,
            _ => Action::Unknown,
        }
    }

    fn quadrant_confidence(&self, smart_score: f64, indicators: &IndicatorSnapshot) -> f64 {
        let mut confidence = 0.4 + 0.4 * smart_score.abs().tanh();

        if finite_or_zero(indicators.vol_z) >= self.thresholds.vol_z {
            confidence += BONUS;
        }
        let cvd_z = finite_or_zero(indicators.cvd_z);
        let obi_z = finite_or_zero(indicators.obi_z);
        let aligned = (cvd_z >= self.thresholds.cvd_z && obi_z >= self.thresholds.obi_z)
            || (cvd_z <= -self.thresholds.cvd_z && obi_z <= -self.thresholds.obi_z);
        if aligned {
            confidence += BONUS;
        }
        confidence
    }

    fn order_confidence(&self, order: &OrderSignal) -> f64 {
        let mut confidence = 0.5;
        if order.has_large_orders() {
            confidence += 0.1;
        }
        if order.spoofing() {
            confidence -= 0.15;
        }
        if order.separation() >= self.separation_boost_ratio {
            confidence += 0.15;
        }
        confidence
    }

    /// Fuse one cycle's order signal and indicators
    pub fn integrate(
        &self,
        instrument: &str,
        order: &OrderSignal,
        indicators: &IndicatorSnapshot,
        timestamp: DateTime<Utc>,
    ) -> IntegratedSignal {
        let order_score = order.order_score();
        let smart_score = self.smart_score(
            order_score,
            indicators.cvd_z,
            indicators.oi_z,
            indicators.delta_z,
        );
        let quadrant = self.quadrant(indicators);

        let (action, confidence, source, reason) = if order.action == Action::Unknown {
            if quadrant == Action::Unknown {
                (Action::Unknown, 0.0, SignalSource::Quadrant, self.quadrant_reason(indicators))
            } else {
                (
                    quadrant,
                    self.quadrant_confidence(smart_score, indicators),
                    SignalSource::Quadrant,
                    self.quadrant_reason(indicators),
                )
            }
        } else if order.action == quadrant {
            (
                order.action,
                self.order_confidence(order) * AGREEMENT_BOOST,
                SignalSource::Agreement,
                format!("order flow and indicators agree on {}", order.action),
            )
        } else if quadrant == Action::Unknown {
            (
                order.action,
                self.order_confidence(order),
                SignalSource::OrderFlow,
                format!("order flow {}", order.action),
            )
        } else {
            self.resolve_conflict(order, quadrant, smart_score)
        };

        IntegratedSignal {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            action,
            confidence: clamp_confidence(confidence),
            components: SignalComponents {
                order_score,
                cvd_z: indicators.cvd_z,
                oi_z: indicators.oi_z,
                delta_z: indicators.delta_z,
                obi_z: indicators.obi_z,
                vol_z: indicators.vol_z,
                smart_score,
                price_change_pct: indicators.price_change_pct,
            },
            source,
            reason,
            timestamp,
        }
    }

    fn resolve_conflict(
        &self,
        order: &OrderSignal,
        quadrant: Action,
        smart_score: f64,
    ) -> (Action, f64, SignalSource, String) {
        let order_dominant = order.strength() > self.strong_order_strength || order.spoofing();
        let quadrant_strong = smart_score.abs() >= self.contradiction_score;

        match (order_dominant, quadrant_strong) {
            (true, false) => (
                order.action,
                self.order_confidence(order),
                SignalSource::OrderFlow,
                format!("order flow {} overrides weak {}", order.action, quadrant),
            ),
            (true, true) if order.spoofing() => (
                Action::Manipulation,
                CONFLICT_CONFIDENCE,
                SignalSource::Conflict,
                format!("spoofed order flow {} against {}", order.action, quadrant),
            ),
            _ => (
                Action::Unknown,
                CONFLICT_CONFIDENCE,
                SignalSource::Conflict,
                format!("order flow {} contradicts {}", order.action, quadrant),
            ),
        }
    }

    fn quadrant_reason(&self, indicators: &IndicatorSnapshot) -> String {
        if !indicators.data_sufficient {
            return "insufficient data".to_string();
        }
        format!(
            "price {:?}, cvd_z {:.2}, oi_z {:.2}",
            indicators.price_direction, indicators.cvd_z, indicators.oi_z
        )
        .to_lowercase()
    }
}
