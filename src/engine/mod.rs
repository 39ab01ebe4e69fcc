//! Detection engine
//!
//! Wires the per-instrument pipeline (delta aggregation, order tracking,
//! indicators, fusion, phase state and cooldowns) to the trade feed and the
//! snapshot source, and publishes phase events.

mod detector;
mod pipeline;
mod stats;
mod types;

pub use detector::SmartMoneyEngine;
pub use pipeline::InstrumentPipeline;
pub use types::{CycleOutcome, DetectionError, EngineStats};
