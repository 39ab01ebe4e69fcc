//! Indicator snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-valued direction of a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rising,
    Flat,
    Falling,
}

impl Direction {
    /// Direction from a z-score and a symmetric threshold
    pub fn from_z(z: f64, threshold: f64) -> Self {
        if z >= threshold {
            Direction::Rising
        } else if z <= -threshold {
            Direction::Falling
        } else {
            Direction::Flat
        }
    }

    /// Direction of a percentage move with a flat band of `flat_pct`
    pub fn from_change_pct(change_pct: f64, flat_pct: f64) -> Self {
        if !change_pct.is_finite() || change_pct.abs() <= flat_pct {
            Direction::Flat
        } else if change_pct > 0.0 {
            Direction::Rising
        } else {
            Direction::Falling
        }
    }
}

/// Normalised indicator values for one detection cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: Option<f64>,
    /// Last close-to-close change in percent
    pub price_change_pct: f64,
    pub price_direction: Direction,
    pub obi: Option<f64>,
    pub obi_z: f64,
    pub cvd: f64,
    pub cvd_z: f64,
    pub open_interest: Option<f64>,
    pub oi_z: f64,
    pub volume: f64,
    pub vol_z: f64,
    /// 15-minute smoothed delta, or the realtime imbalance before the first window
    pub delta: f64,
    pub delta_z: f64,
    pub funding_rate: Option<f64>,
    /// Enough candles for the price/CVD path
    pub data_sufficient: bool,
    pub computed_at: DateTime<Utc>,
}

impl IndicatorSnapshot {
    /// All-neutral snapshot
    pub fn neutral(computed_at: DateTime<Utc>) -> Self {
        Self {
            price: None,
            price_change_pct: 0.0,
            price_direction: Direction::Flat,
            obi: None,
            obi_z: 0.0,
            cvd: 0.0,
            cvd_z: 0.0,
            open_interest: None,
            oi_z: 0.0,
            volume: 0.0,
            vol_z: 0.0,
            delta: 0.0,
            delta_z: 0.0,
            funding_rate: None,
            data_sufficient: false,
            computed_at,
        }
    }
}
