//! Order tracking module
//!
//! Large resting order lifecycle, classification and aggregate order signal

mod classifier;
mod tracker;
mod types;

pub use classifier::classify;
pub use tracker::OrderTracker;
pub use types::{OrderClass, OrderSignal, Side, TrackedOrder};
