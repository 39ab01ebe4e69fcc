//! End-to-end detection over scripted snapshots

use chrono::{DateTime, Duration, TimeZone, Utc};
use smart_money::config::Config;
use smart_money::cooldown::{EntryReason, ManualClock};
use smart_money::engine::{DetectionError, SmartMoneyEngine};
use smart_money::exchange::{Candle, ExchangeError, MarketSnapshot, StaticSource};
use smart_money::phase::{Phase, PhaseEvent};
use std::sync::Arc;

const SYMBOL: &str = "BTCUSDT";

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

fn config() -> Config {
    let mut config = Config::default();
    config.feed.symbols = vec![SYMBOL.into(), "ETHUSDT".into()];
    config.detection.refresh_interval_sec = 15;
    config.detection.cycle_interval_sec = 15;
    config
}

/// Five candles ending flat, with volume and OI scaled by `k`
fn snapshot(closes: [f64; 5], k: usize) -> MarketSnapshot {
    let scale = k as f64;
    MarketSnapshot {
        symbol: SYMBOL.into(),
        candles: closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                open_time: start() + Duration::minutes(15 * i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 10.0 * scale,
            })
            .collect(),
        book: None,
        open_interest: Some(1000.0 * scale),
        funding_rate: Some(0.0001),
    }
}

fn accumulation(k: usize) -> MarketSnapshot {
    snapshot([100.0, 100.5, 101.0, 101.5, 101.5], k)
}

fn distribution(k: usize) -> MarketSnapshot {
    snapshot([101.5, 101.0, 100.5, 100.0, 100.0], k)
}

struct Harness {
    engine: SmartMoneyEngine<Arc<StaticSource>>,
    source: Arc<StaticSource>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new() -> Self {
        let source = Arc::new(StaticSource::new());
        let clock = Arc::new(ManualClock::new(start()));
        let engine = SmartMoneyEngine::new(config(), source.clone(), clock.clone());
        Self {
            engine,
            source,
            clock,
        }
    }

    async fn cycle(&self, snapshot: MarketSnapshot) -> Vec<PhaseEvent> {
        self.source.push(snapshot);
        let outcome = self.engine.run_cycle(SYMBOL).await.unwrap();
        self.clock.advance(Duration::seconds(15));
        outcome.events
    }
}

#[tokio::test]
async fn test_accumulation_then_distribution() {
    let h = Harness::new();
    let mut events = h.engine.subscribe();

    for k in 1..=20 {
        h.cycle(accumulation(k)).await;
    }
    let state = h.engine.get_state(SYMBOL).await.unwrap();
    assert_eq!(state.current_phase, Phase::Accumulate);

    for k in 21..=30 {
        h.cycle(distribution(k)).await;
    }
    let state = h.engine.get_state(SYMBOL).await.unwrap();
    assert_eq!(state.current_phase, Phase::Distribution);

    let mut transitions = Vec::new();
    let mut candidates = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            PhaseEvent::PhaseChange { from, to, .. } => transitions.push((from, to)),
            PhaseEvent::Candidate { .. } => candidates += 1,
        }
    }
    assert_eq!(
        transitions,
        vec![
            (Phase::None, Phase::Accumulate),
            (Phase::Accumulate, Phase::Distribution)
        ]
    );
    assert_eq!(candidates, 2);

    let stats = h.engine.get_stats().await;
    assert_eq!(stats.total_detections, 30);
    assert_eq!(stats.phase_changes, 2);
    assert_eq!(stats.instruments, 2);
}

#[tokio::test]
async fn test_single_noisy_signal_does_not_flip_phase() {
    let h = Harness::new();
    for k in 1..=12 {
        h.cycle(accumulation(k)).await;
    }

    // One distribution reading becomes a candidate only
    let events = h.cycle(distribution(13)).await;
    assert!(matches!(
        events.as_slice(),
        [PhaseEvent::Candidate {
            phase: Phase::Distribution,
            ..
        }]
    ));

    let state = h.engine.get_state(SYMBOL).await.unwrap();
    assert_eq!(state.current_phase, Phase::Accumulate);
    assert!(state.candidate.is_some());
}

#[tokio::test]
async fn test_instruments_are_independent() {
    let h = Harness::new();
    for k in 1..=6 {
        h.cycle(accumulation(k)).await;
    }

    // ETHUSDT has no scripted data
    let err = h.engine.trigger_detection("ETHUSDT").await.unwrap_err();
    assert!(matches!(
        err,
        DetectionError::UpstreamUnavailable {
            source: ExchangeError::Unavailable(_),
            ..
        }
    ));

    let states = h.engine.get_all_states().await;
    assert_eq!(states["BTCUSDT"].current_phase, Phase::Accumulate);
    assert_eq!(states["ETHUSDT"].current_phase, Phase::None);

    let stats = h.engine.get_stats().await;
    assert_eq!(stats.errors_by_instrument.get("ETHUSDT"), Some(&1));
    assert!(!stats.errors_by_instrument.contains_key("BTCUSDT"));
}

#[tokio::test]
async fn test_confirmed_phase_gated_by_cooldown() {
    let h = Harness::new();
    let mut gated = Vec::new();
    for k in 1..=6 {
        for event in h.cycle(accumulation(k)).await {
            if event.is_phase_change() {
                gated.push(h.engine.gate_action(SYMBOL, "alert").await.unwrap());
            }
        }
    }
    assert_eq!(gated.len(), 1);
    assert!(gated[0].allowed);

    let again = h.engine.gate_action(SYMBOL, "alert").await.unwrap();
    assert!(!again.allowed);
    assert_eq!(again.reason, EntryReason::CooldownActive);

    h.clock.advance(Duration::minutes(31));
    let later = h.engine.gate_action(SYMBOL, "alert").await.unwrap();
    assert!(later.allowed);
    assert_eq!(later.daily_count, 1);
}
