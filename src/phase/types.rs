//! Phase state and event types

use crate::integrator::{Action, SignalComponents};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Confirmed market phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    None,
    Accumulate,
    Markup,
    Distribution,
    Markdown,
}

impl Phase {
    /// Phase an action could be confirmed as; MANIPULATION and UNKNOWN never are
    pub fn from_action(action: Action) -> Option<Phase> {
        match action {
            Action::Accumulate => Some(Phase::Accumulate),
            Action::Markup => Some(Phase::Markup),
            Action::Distribution => Some(Phase::Distribution),
            Action::Markdown => Some(Phase::Markdown),
            Action::Manipulation | Action::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::None => "NONE",
            Phase::Accumulate => "ACCUMULATE",
            Phase::Markup => "MARKUP",
            Phase::Distribution => "DISTRIBUTION",
            Phase::Markdown => "MARKDOWN",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisional phase awaiting confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub phase: Phase,
    pub reason: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Matching cycles so far, including the first
    pub occurrences: u32,
    /// Confidence of the latest matching signal
    pub confidence: f64,
}

/// Confirmed phase plus any pending candidate for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub instrument: String,
    pub current_phase: Phase,
    pub since: DateTime<Utc>,
    pub confidence: f64,
    pub candidate: Option<Candidate>,
    pub last_signal_at: Option<DateTime<Utc>>,
}

impl PhaseState {
    pub fn new(instrument: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            current_phase: Phase::None,
            since: now,
            confidence: 0.0,
            candidate: None,
            last_signal_at: None,
        }
    }
}

/// Outbound detection events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseEvent {
    /// A new unconfirmed phase was observed
    Candidate {
        instrument: String,
        phase: Phase,
        reason: String,
        since: DateTime<Utc>,
        confidence: f64,
        metrics: SignalComponents,
    },
    /// A candidate was promoted to the confirmed phase
    PhaseChange {
        id: Uuid,
        instrument: String,
        from: Phase,
        to: Phase,
        confidence: f64,
        reason: String,
        metrics: SignalComponents,
        time: DateTime<Utc>,
    },
}

impl PhaseEvent {
    pub fn instrument(&self) -> &str {
        match self {
            PhaseEvent::Candidate { instrument, .. } | PhaseEvent::PhaseChange { instrument, .. } => {
                instrument
            }
        }
    }

    pub fn is_phase_change(&self) -> bool {
        matches!(self, PhaseEvent::PhaseChange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_action() {
        assert_eq!(Phase::from_action(Action::Accumulate), Some(Phase::Accumulate));
        assert_eq!(Phase::from_action(Action::Markdown), Some(Phase::Markdown));
        assert_eq!(Phase::from_action(Action::Manipulation), None);
        assert_eq!(Phase::from_action(Action::Unknown), None);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PhaseEvent::PhaseChange {
            id: Uuid::nil(),
            instrument: "BTCUSDT".into(),
            from: Phase::None,
            to: Phase::Accumulate,
            confidence: 0.6,
            reason: "test".into(),
            metrics: SignalComponents::default(),
            time: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "phase_change");
        assert_eq!(json["from"], "NONE");
        assert_eq!(json["to"], "ACCUMULATE");
        assert_eq!(event.instrument(), "BTCUSDT");
        assert!(event.is_phase_change());
    }
}
