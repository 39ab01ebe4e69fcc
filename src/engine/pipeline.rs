//! Per-instrument detection pipeline

use super::types::{CycleOutcome, DetectionError};
use crate::config::{Config, CooldownConfig};
use crate::cooldown::{Clock, CooldownCache, CooldownKey, EntryDecision, RecordedAction};
use crate::delta::{DeltaAggregator, DeltaSample, TickError, WindowKind};
use crate::exchange::MarketSnapshot;
use crate::feed::TradeTick;
use crate::indicators::IndicatorEngine;
use crate::integrator::SignalIntegrator;
use crate::orders::OrderTracker;
use crate::phase::{PhaseState, PhaseStateMachine};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// All mutable state for one instrument
///
/// Owned behind a single lock so tick ingestion, window timers and
/// detection cycles are linearised per instrument.
pub struct InstrumentPipeline {
    instrument: String,
    min_candles: usize,
    delta: DeltaAggregator,
    orders: OrderTracker,
    indicators: IndicatorEngine,
    phase: PhaseStateMachine,
    cooldown: CooldownCache,
    errors: u64,
}

impl InstrumentPipeline {
    pub fn new(
        instrument: impl Into<String>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let instrument = instrument.into();
        let now = clock.now();
        Self {
            min_candles: config.detection.min_candles,
            delta: DeltaAggregator::new(
                instrument.clone(),
                &config.delta,
                config.detection.cvd_epoch(),
            ),
            orders: OrderTracker::new(
                instrument.clone(),
                config.orders.clone(),
                config.detection.obi_top_n,
            ),
            indicators: IndicatorEngine::new(config.detection.clone()),
            phase: PhaseStateMachine::new(instrument.clone(), config.phase.clone(), now),
            cooldown: CooldownCache::new(clock),
            errors: 0,
            instrument,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Feed one trade tick, returning whether it filled a tracked order
    pub fn ingest(&mut self, tick: &TradeTick) -> Result<bool, TickError> {
        self.delta.ingest(tick)?;
        Ok(self.orders.mark_consumed(tick))
    }

    pub fn compute_window(&mut self, kind: WindowKind, now: DateTime<Utc>) -> DeltaSample {
        self.delta.compute_window(kind, now)
    }

    /// One detection pass over a freshly fetched snapshot
    pub fn run_cycle(
        &mut self,
        snapshot: &MarketSnapshot,
        integrator: &SignalIntegrator,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let mut warnings = Vec::new();

        if snapshot.candles.len() < self.min_candles {
            warnings.push(DetectionError::DataInsufficient {
                instrument: self.instrument.clone(),
                detail: format!(
                    "{} candles, need {}",
                    snapshot.candles.len(),
                    self.min_candles
                ),
            });
        }

        match (&snapshot.book, snapshot.reference_price()) {
            (Some(book), Some(price)) => {
                self.orders.update(book, price, now);
            }
            (Some(_), None) => warnings.push(DetectionError::ComputationDegenerate {
                instrument: self.instrument.clone(),
                detail: "no reference price for order sizing".into(),
            }),
            (None, _) => {}
        }

        let order_signal = self.orders.signal(now);
        let indicators = self.indicators.update(snapshot, &self.delta.snapshot(), now);
        let signal = integrator.integrate(&self.instrument, &order_signal, &indicators, now);
        let events = self.phase.on_signal(&signal);

        for warning in &warnings {
            tracing::debug!(instrument = %self.instrument, warning = %warning, "Degraded cycle");
        }

        CycleOutcome {
            signal,
            events,
            state: self.phase.state().clone(),
            warnings,
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn state(&self) -> &PhaseState {
        self.phase.state()
    }

    pub fn phase_machine_mut(&mut self) -> &mut PhaseStateMachine {
        &mut self.phase
    }

    pub fn tracked_orders(&self) -> usize {
        self.orders.len()
    }

    pub fn indicator_history(&self) -> usize {
        self.indicators.history_len()
    }

    /// Check the cooldown for `purpose` and record the action when allowed
    pub fn gate(&mut self, purpose: &str, config: &CooldownConfig) -> EntryDecision {
        let key = CooldownKey::new(self.instrument.clone(), purpose);
        let decision =
            self.cooldown
                .can_enter(&key, config.cooldown_minutes, config.max_daily_actions);
        if decision.allowed {
            self.cooldown.update_entry(&key);
        }
        decision
    }

    pub fn cooldown(&self) -> &CooldownCache {
        &self.cooldown
    }

    pub fn replay_cooldowns(&mut self, actions: Vec<RecordedAction>) -> usize {
        self.cooldown.replay(actions)
    }

    pub fn reset_cooldowns(&mut self) {
        self.cooldown.reset_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cooldown::{EntryReason, ManualClock};
    use crate::exchange::{BookLevel, Candle, OrderBookSnapshot};
    use crate::integrator::Action;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn pipeline() -> (InstrumentPipeline, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let p = InstrumentPipeline::new("BTCUSDT", &Config::default(), clock.clone());
        (p, clock)
    }

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle {
                open_time: start(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + i as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_ingest_rejects_other_instrument() {
        let (mut p, _) = pipeline();
        let tick = TradeTick::new("ETHUSDT", dec!(10), dec!(1), start(), false);
        assert!(matches!(
            p.ingest(&tick),
            Err(TickError::InstrumentMismatch { .. })
        ));

        let tick = TradeTick::new("BTCUSDT", dec!(10), dec!(1), start(), false);
        assert_eq!(p.ingest(&tick), Ok(false));
    }

    #[test]
    fn test_empty_snapshot_degrades_to_unknown() {
        let (mut p, _) = pipeline();
        let integrator = SignalIntegrator::with_defaults();
        let snapshot = MarketSnapshot {
            symbol: "BTCUSDT".into(),
            ..Default::default()
        };

        let outcome = p.run_cycle(&snapshot, &integrator, start());
        assert_eq!(outcome.signal.action, Action::Unknown);
        assert!(outcome.events.is_empty());
        assert!(matches!(
            outcome.warnings.as_slice(),
            [DetectionError::DataInsufficient { .. }]
        ));
    }

    #[test]
    fn test_book_without_price_is_degenerate() {
        let (mut p, _) = pipeline();
        let integrator = SignalIntegrator::with_defaults();
        let snapshot = MarketSnapshot {
            symbol: "BTCUSDT".into(),
            candles: Vec::new(),
            book: Some(OrderBookSnapshot::default()),
            ..Default::default()
        };

        let outcome = p.run_cycle(&snapshot, &integrator, start());
        assert!(outcome
            .warnings
            .iter()
            .any(|w| matches!(w, DetectionError::ComputationDegenerate { .. })));
    }

    #[test]
    fn test_cycle_tracks_large_orders() {
        let (mut p, _) = pipeline();
        let integrator = SignalIntegrator::with_defaults();
        let snapshot = MarketSnapshot {
            symbol: "BTCUSDT".into(),
            candles: candles(6),
            book: Some(OrderBookSnapshot {
                bids: vec![BookLevel::new(dec!(105), dec!(20000))],
                asks: vec![BookLevel::new(dec!(106), dec!(1))],
            }),
            open_interest: Some(1000.0),
            funding_rate: None,
        };

        let outcome = p.run_cycle(&snapshot, &integrator, start());
        assert!(outcome.warnings.is_empty());
        assert_eq!(p.tracked_orders(), 1);
        assert_eq!(p.indicator_history(), 1);
    }

    #[test]
    fn test_gate_records_allowed_actions() {
        let (mut p, clock) = pipeline();
        let cfg = CooldownConfig::default();

        let first = p.gate("phase_change", &cfg);
        assert!(first.allowed);
        assert_eq!(first.reason, EntryReason::FirstEntry);

        clock.advance(chrono::Duration::minutes(5));
        let second = p.gate("phase_change", &cfg);
        assert!(!second.allowed);
        assert_eq!(second.reason, EntryReason::CooldownActive);
        assert_eq!(p.cooldown().len(), 1);
    }
}
