//! Lock-free engine counters

use super::types::EngineStats;
use crate::phase::PhaseEvent;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    detections: AtomicU64,
    phase_changes: AtomicU64,
    candidates: AtomicU64,
    errors: AtomicU64,
}

impl StatsCounters {
    pub fn record_detection(&self, events: &[PhaseEvent]) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        for event in events {
            match event {
                PhaseEvent::Candidate { .. } => self.candidates.fetch_add(1, Ordering::Relaxed),
                PhaseEvent::PhaseChange { .. } => {
                    self.phase_changes.fetch_add(1, Ordering::Relaxed)
                }
            };
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Totals only; per-instrument fields are filled by the caller
    pub fn totals(&self) -> EngineStats {
        EngineStats {
            total_detections: self.detections.load(Ordering::Relaxed),
            phase_changes: self.phase_changes.load(Ordering::Relaxed),
            candidates: self.candidates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::SignalComponents;
    use crate::phase::Phase;
    use chrono::Utc;

    #[test]
    fn test_counts_events_by_kind() {
        let counters = StatsCounters::default();
        let candidate = PhaseEvent::Candidate {
            instrument: "BTCUSDT".into(),
            phase: Phase::Markup,
            reason: "r".into(),
            since: Utc::now(),
            confidence: 0.6,
            metrics: SignalComponents::default(),
        };
        counters.record_detection(&[candidate.clone(), candidate]);
        counters.record_detection(&[]);
        counters.record_error();

        let stats = counters.totals();
        assert_eq!(stats.total_detections, 2);
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.phase_changes, 0);
        assert_eq!(stats.errors, 1);
    }
}
