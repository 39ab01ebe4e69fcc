//! Integrated signal types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest confidence the integrator will report
pub const MIN_CONFIDENCE: f64 = 0.30;
/// Highest confidence the integrator will report
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Instantaneous smart-money action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Accumulate,
    Markup,
    Distribution,
    Markdown,
    Manipulation,
    Unknown,
}

impl Action {
    /// One of the four market phases
    pub fn is_phase(self) -> bool {
        matches!(
            self,
            Action::Accumulate | Action::Markup | Action::Distribution | Action::Markdown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Accumulate => "ACCUMULATE",
            Action::Markup => "MARKUP",
            Action::Distribution => "DISTRIBUTION",
            Action::Markdown => "MARKDOWN",
            Action::Manipulation => "MANIPULATION",
            Action::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path decided the action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Order tracker action, quadrant neutral or overruled
    OrderFlow,
    /// Four-quadrant rule over price, CVD and OI
    Quadrant,
    /// Both paths agreed
    Agreement,
    /// Paths contradicted each other
    Conflict,
}

/// Inputs and intermediate values behind a signal
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalComponents {
    pub order_score: f64,
    pub cvd_z: f64,
    pub oi_z: f64,
    pub delta_z: f64,
    pub obi_z: f64,
    pub vol_z: f64,
    pub smart_score: f64,
    pub price_change_pct: f64,
}

/// One cycle's fused output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedSignal {
    pub id: Uuid,
    pub instrument: String,
    pub action: Action,
    /// Always within [MIN_CONFIDENCE, MAX_CONFIDENCE]
    pub confidence: f64,
    pub components: SignalComponents,
    pub source: SignalSource,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl IntegratedSignal {
    /// Build a signal directly, clamping confidence into range
    pub fn new(
        instrument: impl Into<String>,
        action: Action,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.into(),
            action,
            confidence: clamp_confidence(confidence),
            components: SignalComponents::default(),
            source: SignalSource::Quadrant,
            reason: action.as_str().to_lowercase(),
            timestamp,
        }
    }
}

/// Clamp into [MIN_CONFIDENCE, MAX_CONFIDENCE], mapping NaN to the floor
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        return MIN_CONFIDENCE;
    }
    confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
