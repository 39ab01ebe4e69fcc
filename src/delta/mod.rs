//! Delta aggregation module
//!
//! Realtime, 15-minute and 1-hour buy/sell imbalance per instrument

mod aggregator;
mod types;

pub use aggregator::{ema, DeltaAggregator};
pub use types::{DeltaSample, DeltaSnapshot, FlowCounter, TickError, WindowKind};
