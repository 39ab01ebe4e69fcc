//! Phase state machine module
//!
//! Candidate/confirm hysteresis over the integrated signal stream

mod machine;
mod types;

pub use machine::PhaseStateMachine;
pub use types::{Candidate, Phase, PhaseEvent, PhaseState};
