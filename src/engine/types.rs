//! Engine types

use crate::config::ConfigError;
use crate::exchange::ExchangeError;
use crate::integrator::IntegratedSignal;
use crate::phase::{PhaseEvent, PhaseState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Detection failures and degradations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionError {
    /// Too little input for an indicator; it is reported neutral
    #[error("insufficient data for {instrument}: {detail}")]
    DataInsufficient { instrument: String, detail: String },
    /// Snapshot source failed; last-known state is kept
    #[error("upstream unavailable for {instrument}: {source}")]
    UpstreamUnavailable {
        instrument: String,
        #[source]
        source: ExchangeError,
    },
    /// A computation had no meaningful value and was neutralised
    #[error("degenerate computation for {instrument}: {detail}")]
    ComputationDegenerate { instrument: String, detail: String },
    #[error(transparent)]
    ConfigurationInvalid(#[from] ConfigError),
    #[error("unknown instrument {0}")]
    UnknownInstrument(String),
    #[error("engine stopped")]
    Stopped,
}

/// Result of one detection cycle for one instrument
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub signal: IntegratedSignal,
    pub events: Vec<PhaseEvent>,
    pub state: PhaseState,
    /// Non-fatal degradations hit during the cycle
    pub warnings: Vec<DetectionError>,
}

/// Engine-wide counters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_detections: u64,
    pub phase_changes: u64,
    pub candidates: u64,
    pub errors: u64,
    pub errors_by_instrument: BTreeMap<String, u64>,
    pub instruments: usize,
    pub uptime_secs: u64,
}
