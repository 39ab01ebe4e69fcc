//! Signal integration module
//!
//! Fuses order-flow and indicator evidence into one action per cycle

mod fusion;
mod types;

pub use fusion::SignalIntegrator;
pub use types::{
    clamp_confidence, Action, IntegratedSignal, SignalComponents, SignalSource, MAX_CONFIDENCE,
    MIN_CONFIDENCE,
};
