//! Indicator z-score module
//!
//! Rolling OBI, CVD, OI, volume and delta histories normalised to z-scores

mod engine;
mod series;
mod types;

pub use engine::{cumulative_volume_delta, price_change_pct, IndicatorEngine};
pub use series::RollingSeries;
pub use types::{Direction, IndicatorSnapshot};
