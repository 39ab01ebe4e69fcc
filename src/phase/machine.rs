//! Candidate/confirm phase state machine

use super::types::{Candidate, Phase, PhaseEvent, PhaseState};
use crate::config::{chrono_secs, PhaseConfig};
use crate::integrator::IntegratedSignal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Turns the per-cycle signal stream of one instrument into a stable phase timeline
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    config: PhaseConfig,
    state: PhaseState,
}

impl PhaseStateMachine {
    pub fn new(instrument: impl Into<String>, config: PhaseConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            state: PhaseState::new(instrument, now),
        }
    }

    pub fn with_defaults(instrument: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(instrument, PhaseConfig::default(), now)
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    /// Seed a confirmed phase without emitting events
    pub fn restore(&mut self, phase: Phase, since: DateTime<Utc>, confidence: f64) {
        self.state.current_phase = phase;
        self.state.since = since;
        self.state.confidence = confidence;
        self.state.candidate = None;
    }

    /// Process one integrated signal
    pub fn on_signal(&mut self, signal: &IntegratedSignal) -> Vec<PhaseEvent> {
        let now = signal.timestamp;
        self.state.last_signal_at = Some(now);
        self.expire_candidate(now);

        let Some(phase) = Phase::from_action(signal.action) else {
            if self.state.candidate.take().is_some() {
                tracing::debug!(
                    instrument = %self.state.instrument,
                    action = %signal.action,
                    "Candidate reset by non-phase signal"
                );
            }
            return Vec::new();
        };

        if phase == self.state.current_phase {
            self.state.candidate = None;
            self.state.confidence = signal.confidence;
            return Vec::new();
        }

        let mut events = Vec::new();
        match self.state.candidate.as_mut() {
            Some(candidate) if candidate.phase == phase => {
                candidate.occurrences += 1;
                candidate.last_seen_at = now;
                candidate.confidence = signal.confidence;
            }
            _ => {
                let candidate = Candidate {
                    phase,
                    reason: signal.reason.clone(),
                    first_seen_at: now,
                    last_seen_at: now,
                    occurrences: 1,
                    confidence: signal.confidence,
                };
                tracing::debug!(
                    instrument = %self.state.instrument,
                    phase = %phase,
                    confidence = signal.confidence,
                    "New phase candidate"
                );
                events.push(PhaseEvent::Candidate {
                    instrument: self.state.instrument.clone(),
                    phase,
                    reason: candidate.reason.clone(),
                    since: now,
                    confidence: signal.confidence,
                    metrics: signal.components,
                });
                self.state.candidate = Some(candidate);
            }
        }

        if let Some(event) = self.try_promote(signal) {
            events.push(event);
        }
        events
    }

    fn ready(&self, candidate: &Candidate, confidence: f64, now: DateTime<Utc>) -> bool {
        candidate.occurrences >= self.config.min_persistence_cycles
            && now - candidate.first_seen_at
                >= chrono_secs(self.config.min_persistence_secs)
            && confidence >= self.config.min_confidence
    }

    fn try_promote(&mut self, signal: &IntegratedSignal) -> Option<PhaseEvent> {
        let now = signal.timestamp;
        let candidate = self.state.candidate.as_ref()?;
        if !self.ready(candidate, signal.confidence, now) {
            return None;
        }
        let candidate = self.state.candidate.take()?;

        let from = self.state.current_phase;
        self.state.current_phase = candidate.phase;
        self.state.since = now;
        self.state.confidence = signal.confidence;

        tracing::info!(
            instrument = %self.state.instrument,
            from = %from,
            to = %candidate.phase,
            confidence = signal.confidence,
            occurrences = candidate.occurrences,
            "Phase confirmed"
        );

        Some(PhaseEvent::PhaseChange {
            id: Uuid::new_v4(),
            instrument: self.state.instrument.clone(),
            from,
            to: candidate.phase,
            confidence: signal.confidence,
            reason: candidate.reason,
            metrics: signal.components,
            time: now,
        })
    }

    fn expire_candidate(&mut self, now: DateTime<Utc>) {
        let max_age = chrono_secs(self.config.candidate_max_age_secs);
        let stale = self
            .state
            .candidate
            .as_ref()
            .is_some_and(|c| now - c.first_seen_at > max_age);
        if stale {
            tracing::debug!(instrument = %self.state.instrument, "Discarding stale candidate");
            self.state.candidate = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::Action;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn signal(action: Action, confidence: f64, secs: i64) -> IntegratedSignal {
        IntegratedSignal::new("BTCUSDT", action, confidence, t(secs))
    }

    fn feed(machine: &mut PhaseStateMachine, actions: &[Action], start: i64) -> Vec<PhaseEvent> {
        actions
            .iter()
            .enumerate()
            .flat_map(|(i, a)| machine.on_signal(&signal(*a, 0.7, start + 15 * i as i64)))
            .collect()
    }

    fn phase_changes(events: &[PhaseEvent]) -> usize {
        events.iter().filter(|e| e.is_phase_change()).count()
    }

    #[test]
    fn test_promotes_after_persistence() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));

        let e1 = m.on_signal(&signal(Action::Accumulate, 0.7, 0));
        assert!(matches!(e1.as_slice(), [PhaseEvent::Candidate { phase: Phase::Accumulate, .. }]));
        assert!(m.on_signal(&signal(Action::Accumulate, 0.7, 15)).is_empty());

        let e3 = m.on_signal(&signal(Action::Accumulate, 0.7, 30));
        match e3.as_slice() {
            [PhaseEvent::PhaseChange { from, to, .. }] => {
                assert_eq!(*from, Phase::None);
                assert_eq!(*to, Phase::Accumulate);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert_eq!(m.state().current_phase, Phase::Accumulate);
        assert_eq!(m.state().since, t(30));
        assert!(m.state().candidate.is_none());
    }

    #[test]
    fn test_requires_minimum_duration() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        for i in 0..5 {
            m.on_signal(&signal(Action::Markup, 0.8, i * 5));
        }
        // five cycles but only 20s of persistence
        assert_eq!(m.state().current_phase, Phase::None);
        let events = m.on_signal(&signal(Action::Markup, 0.8, 30));
        assert_eq!(phase_changes(&events), 1);
    }

    #[test]
    fn test_requires_minimum_confidence() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        for i in 0..6 {
            m.on_signal(&signal(Action::Markup, 0.4, i * 15));
        }
        assert_eq!(m.state().current_phase, Phase::None);
        assert_eq!(m.state().candidate.as_ref().unwrap().occurrences, 6);

        let events = m.on_signal(&signal(Action::Markup, 0.6, 90));
        assert_eq!(phase_changes(&events), 1);
    }

    #[test]
    fn test_alternating_actions_never_promote() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        let actions: Vec<Action> = (0..40)
            .map(|i| match i % 4 {
                0 => Action::Accumulate,
                1 => Action::Markup,
                2 => Action::Distribution,
                _ => Action::Markdown,
            })
            .collect();
        let events = feed(&mut m, &actions, 0);
        assert_eq!(phase_changes(&events), 0);
        assert_eq!(events.len(), 40);
        assert_eq!(m.state().current_phase, Phase::None);
    }

    #[test]
    fn test_isolated_contradiction_does_not_flip() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        feed(&mut m, &[Action::Accumulate; 3], 0);
        assert_eq!(m.state().current_phase, Phase::Accumulate);

        let events = feed(
            &mut m,
            &[Action::Distribution, Action::Accumulate, Action::Accumulate],
            45,
        );
        assert_eq!(phase_changes(&events), 0);
        assert_eq!(m.state().current_phase, Phase::Accumulate);
        assert!(m.state().candidate.is_none());
    }

    #[test]
    fn test_unknown_resets_candidate_but_not_phase() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        feed(&mut m, &[Action::Markup; 3], 0);
        feed(&mut m, &[Action::Markdown, Action::Markdown], 45);
        assert_eq!(m.state().candidate.as_ref().unwrap().occurrences, 2);

        m.on_signal(&signal(Action::Manipulation, 0.9, 75));
        assert!(m.state().candidate.is_none());
        assert_eq!(m.state().current_phase, Phase::Markup);

        // progress starts over
        let events = feed(&mut m, &[Action::Markdown, Action::Markdown], 90);
        assert_eq!(phase_changes(&events), 0);
    }

    #[test]
    fn test_new_candidate_discards_progress() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        feed(&mut m, &[Action::Markup, Action::Markup], 0);
        let events = m.on_signal(&signal(Action::Markdown, 0.7, 30));
        assert!(matches!(
            events.as_slice(),
            [PhaseEvent::Candidate { phase: Phase::Markdown, .. }]
        ));
        let c = m.state().candidate.as_ref().unwrap();
        assert_eq!(c.occurrences, 1);
        assert_eq!(c.first_seen_at, t(30));
    }

    #[test]
    fn test_stale_candidate_expires() {
        let config = PhaseConfig {
            min_persistence_cycles: 2,
            candidate_max_age_secs: 60,
            ..PhaseConfig::default()
        };
        let mut m = PhaseStateMachine::new("BTCUSDT", config, t(0));
        m.on_signal(&signal(Action::Markup, 0.7, 0));

        // second sighting arrives after the candidate went stale
        let events = m.on_signal(&signal(Action::Markup, 0.7, 120));
        assert!(matches!(events.as_slice(), [PhaseEvent::Candidate { .. }]));
        assert_eq!(m.state().current_phase, Phase::None);
    }

    #[test]
    fn test_reaffirmation_refreshes_confidence() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        feed(&mut m, &[Action::Accumulate; 3], 0);
        m.on_signal(&signal(Action::Accumulate, 0.9, 45));
        assert_eq!(m.state().confidence, 0.9);
        assert_eq!(m.state().since, t(30));
    }

    #[test]
    fn test_restore_seeds_phase_silently() {
        let mut m = PhaseStateMachine::with_defaults("BTCUSDT", t(0));
        m.restore(Phase::Distribution, t(-3600), 0.75);
        assert_eq!(m.state().current_phase, Phase::Distribution);

        let events = m.on_signal(&signal(Action::Distribution, 0.8, 0));
        assert!(events.is_empty());
    }

    #[test]
    fn test_single_cycle_config_promotes_immediately() {
        let config = PhaseConfig {
            min_persistence_cycles: 1,
            min_persistence_secs: 0,
            ..PhaseConfig::default()
        };
        let mut m = PhaseStateMachine::new("BTCUSDT", config, t(0));
        let events = m.on_signal(&signal(Action::Markdown, 0.7, 0));
        assert_eq!(events.len(), 2);
        assert!(events[1].is_phase_change());
    }
}
