//! Multi-instrument detection engine

use super::pipeline::InstrumentPipeline;
use super::stats::StatsCounters;
use super::types::{CycleOutcome, DetectionError, EngineStats};
use crate::config::Config;
use crate::cooldown::{ActionHistory, Clock, EntryDecision, RecordedAction};
use crate::delta::{DeltaSample, WindowKind};
use crate::exchange::SnapshotSource;
use crate::feed::{TradeFeed, TradeTick};
use crate::integrator::SignalIntegrator;
use crate::phase::{Phase, PhaseEvent, PhaseState};
use crate::telemetry::{incr_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

const EVENT_CAPACITY: usize = 1024;

type SharedPipeline = Arc<Mutex<InstrumentPipeline>>;

/// Smart-money phase detection across a set of instruments
///
/// Each instrument owns an independent [`InstrumentPipeline`]; cloning the
/// engine shares the same registry.
pub struct SmartMoneyEngine<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SmartMoneyEngine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<S> {
    config: Config,
    source: S,
    clock: Arc<dyn Clock>,
    integrator: SignalIntegrator,
    pipelines: RwLock<HashMap<String, SharedPipeline>>,
    events: broadcast::Sender<PhaseEvent>,
    stats: StatsCounters,
    started_at: DateTime<Utc>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    stopped: AtomicBool,
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl<S: SnapshotSource + 'static> SmartMoneyEngine<S> {
    /// Build an engine with one pipeline per configured symbol
    pub fn new(config: Config, source: S, clock: Arc<dyn Clock>) -> Self {
        let config = config.validated();
        let integrator = SignalIntegrator::new(&config.detection, &config.orders);

        let pipelines = config
            .feed
            .symbols
            .iter()
            .map(|s| {
                let symbol = normalize(s);
                let pipeline = InstrumentPipeline::new(symbol.clone(), &config, clock.clone());
                (symbol, Arc::new(Mutex::new(pipeline)))
            })
            .collect();

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                started_at: clock.now(),
                config,
                source,
                clock,
                integrator,
                pipelines: RwLock::new(pipelines),
                events,
                stats: StatsCounters::default(),
                shutdown,
                tasks: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Register an instrument; returns `false` if it was already present
    ///
    /// Instruments added after [`start`](Self::start) are only driven by
    /// explicit calls.
    pub async fn add_instrument(&self, symbol: &str) -> bool {
        let symbol = normalize(symbol);
        let mut pipelines = self.inner.pipelines.write().await;
        if pipelines.contains_key(&symbol) {
            return false;
        }
        let pipeline =
            InstrumentPipeline::new(symbol.clone(), &self.inner.config, self.inner.clock.clone());
        tracing::info!(instrument = %symbol, "Instrument added");
        pipelines.insert(symbol, Arc::new(Mutex::new(pipeline)));
        true
    }

    pub async fn remove_instrument(&self, symbol: &str) -> bool {
        let symbol = normalize(symbol);
        let removed = self.inner.pipelines.write().await.remove(&symbol).is_some();
        if removed {
            tracing::info!(instrument = %symbol, "Instrument removed");
        }
        removed
    }

    /// Registered instruments, sorted
    pub async fn instruments(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.inner.pipelines.read().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    async fn pipeline(&self, symbol: &str) -> Result<SharedPipeline, DetectionError> {
        let symbol = normalize(symbol);
        self.inner
            .pipelines
            .read()
            .await
            .get(&symbol)
            .cloned()
            .ok_or(DetectionError::UnknownInstrument(symbol))
    }

    /// Route one trade tick to its instrument
    ///
    /// Returns whether the tick was accepted; malformed ticks are dropped.
    pub async fn ingest(&self, tick: &TradeTick) -> Result<bool, DetectionError> {
        let pipeline = self.pipeline(&tick.symbol).await?;
        let result = pipeline.lock().await.ingest(tick);
        match result {
            Ok(_) => {
                incr_counter(CounterMetric::TicksIngested, &tick.symbol);
                Ok(true)
            }
            Err(e) => {
                incr_counter(CounterMetric::TicksDropped, &tick.symbol);
                tracing::debug!(instrument = %tick.symbol, error = %e, "Dropped trade tick");
                Ok(false)
            }
        }
    }

    /// Close the `kind` window for `symbol` at the current time
    pub async fn compute_window(
        &self,
        symbol: &str,
        kind: WindowKind,
    ) -> Result<DeltaSample, DetectionError> {
        let pipeline = self.pipeline(symbol).await?;
        let now = self.inner.clock.now();
        let sample = pipeline.lock().await.compute_window(kind, now);
        tracing::debug!(
            instrument = %symbol,
            window = kind.as_str(),
            raw = sample.raw_delta,
            smoothed = ?sample.smoothed_delta,
            "Delta window closed"
        );
        Ok(sample)
    }

    /// Fetch a snapshot and run one detection cycle for `symbol`
    ///
    /// On upstream failure the instrument keeps its last-known state.
    pub async fn run_cycle(&self, symbol: &str) -> Result<CycleOutcome, DetectionError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(DetectionError::Stopped);
        }
        let pipeline = self.pipeline(symbol).await?;
        let symbol = normalize(symbol);

        let snapshot = match self.inner.source.fetch_snapshot(&symbol).await {
            Ok(snapshot) => snapshot,
            Err(source) => {
                pipeline.lock().await.record_error();
                self.inner.stats.record_error();
                incr_counter(CounterMetric::Errors, &symbol);
                tracing::warn!(
                    instrument = %symbol,
                    error = %source,
                    "Snapshot fetch failed, keeping last-known state"
                );
                return Err(DetectionError::UpstreamUnavailable {
                    instrument: symbol,
                    source,
                });
            }
        };

        let now = self.inner.clock.now();
        let outcome = pipeline
            .lock()
            .await
            .run_cycle(&snapshot, &self.inner.integrator, now);

        self.inner.stats.record_detection(&outcome.events);
        incr_counter(CounterMetric::Cycles, &symbol);
        set_gauge(GaugeMetric::Confidence, &symbol, outcome.signal.confidence);
        if let Some(rate) = snapshot.funding_rate {
            set_gauge(GaugeMetric::FundingRate, &symbol, rate);
        }

        for warning in &outcome.warnings {
            tracing::warn!(instrument = %symbol, warning = %warning, "Degraded detection input");
        }
        tracing::debug!(
            instrument = %symbol,
            action = %outcome.signal.action,
            confidence = outcome.signal.confidence,
            reason = %outcome.signal.reason,
            "Detection cycle"
        );

        for event in &outcome.events {
            self.publish(event.clone());
        }
        Ok(outcome)
    }

    fn publish(&self, event: PhaseEvent) {
        let instrument = event.instrument().to_string();
        match &event {
            PhaseEvent::Candidate {
                phase, confidence, ..
            } => {
                incr_counter(CounterMetric::Candidates, &instrument);
                tracing::info!(
                    instrument = %instrument,
                    phase = ?phase,
                    confidence = *confidence,
                    "candidate"
                );
            }
            PhaseEvent::PhaseChange {
                from,
                to,
                confidence,
                ..
            } => {
                incr_counter(CounterMetric::PhaseChanges, &instrument);
                tracing::info!(
                    instrument = %instrument,
                    from = ?from,
                    to = ?to,
                    confidence = *confidence,
                    "phase_change"
                );
            }
        }
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Out-of-cycle refresh returning the resulting state
    pub async fn trigger_detection(&self, symbol: &str) -> Result<PhaseState, DetectionError> {
        self.run_cycle(symbol).await.map(|outcome| outcome.state)
    }

    pub async fn get_state(&self, symbol: &str) -> Option<PhaseState> {
        let pipeline = self.pipeline(symbol).await.ok()?;
        let state = pipeline.lock().await.state().clone();
        Some(state)
    }

    pub async fn get_all_states(&self) -> BTreeMap<String, PhaseState> {
        let pipelines: Vec<(String, SharedPipeline)> = self
            .inner
            .pipelines
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let mut states = BTreeMap::new();
        for (symbol, pipeline) in pipelines {
            let state = pipeline.lock().await.state().clone();
            states.insert(symbol, state);
        }
        states
    }

    pub async fn get_stats(&self) -> EngineStats {
        let mut stats = self.inner.stats.totals();
        let pipelines: Vec<(String, SharedPipeline)> = self
            .inner
            .pipelines
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        stats.instruments = pipelines.len();
        for (symbol, pipeline) in pipelines {
            let errors = pipeline.lock().await.errors();
            if errors > 0 {
                stats.errors_by_instrument.insert(symbol, errors);
            }
        }
        let uptime = self.inner.clock.now() - self.inner.started_at;
        stats.uptime_secs = uptime.num_seconds().max(0) as u64;
        stats
    }

    /// Receive published events; slow receivers observe `Lagged`
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.inner.events.subscribe()
    }

    /// Seed a confirmed phase, e.g. from persisted state
    pub async fn restore_phase(
        &self,
        symbol: &str,
        phase: Phase,
        since: DateTime<Utc>,
        confidence: f64,
    ) -> Result<(), DetectionError> {
        let pipeline = self.pipeline(symbol).await?;
        pipeline
            .lock()
            .await
            .phase_machine_mut()
            .restore(phase, since, confidence);
        Ok(())
    }

    /// Check and record a downstream action for `symbol` under `[cooldown]`
    pub async fn gate_action(
        &self,
        symbol: &str,
        purpose: &str,
    ) -> Result<EntryDecision, DetectionError> {
        let pipeline = self.pipeline(symbol).await?;
        let decision = pipeline
            .lock()
            .await
            .gate(purpose, &self.inner.config.cooldown);
        tracing::debug!(
            instrument = %symbol,
            purpose,
            allowed = decision.allowed,
            reason = %decision.reason,
            daily_count = decision.daily_count,
            "Cooldown gate"
        );
        Ok(decision)
    }

    /// Rebuild every instrument's cooldowns from today's history
    ///
    /// A failing history leaves all caches empty.
    pub async fn restore_cooldowns(&self, history: &dyn ActionHistory) -> usize {
        let pipelines: Vec<(String, SharedPipeline)> = self
            .inner
            .pipelines
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        let actions = match history.actions_on(self.inner.clock.today()).await {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Cooldown history unavailable, starting empty; repeat actions may be allowed"
                );
                for (_, pipeline) in &pipelines {
                    pipeline.lock().await.reset_cooldowns();
                }
                return 0;
            }
        };

        let mut grouped: HashMap<String, Vec<RecordedAction>> = HashMap::new();
        for action in actions {
            grouped
                .entry(normalize(&action.key.instrument))
                .or_default()
                .push(action);
        }

        let mut restored = 0;
        for (symbol, pipeline) in pipelines {
            let actions = grouped.remove(&symbol).unwrap_or_default();
            restored += pipeline.lock().await.replay_cooldowns(actions);
        }
        tracing::info!(restored, "Cooldown state restored");
        restored
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Subscribe to the feed and spawn timers for every registered instrument
    pub async fn start(&self, feed: Arc<dyn TradeFeed>) -> anyhow::Result<()> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            anyhow::bail!(DetectionError::Stopped);
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let symbols = self.instruments().await;
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for symbol in &symbols {
            let ticks = match feed.subscribe(symbol, self.inner.shutdown.subscribe()).await {
                Ok(ticks) => ticks,
                Err(e) => {
                    for handle in &handles {
                        handle.abort();
                    }
                    self.inner.running.store(false, Ordering::SeqCst);
                    return Err(e.context(format!("subscribing to {symbol}")));
                }
            };
            handles.push(self.spawn_ingest(symbol.clone(), ticks));
            for kind in [WindowKind::FifteenMinutes, WindowKind::OneHour] {
                if let Some(handle) = self.spawn_window_timer(symbol.clone(), kind) {
                    handles.push(handle);
                }
            }
            handles.push(self.spawn_cycle_timer(symbol.clone()));
        }

        self.inner.tasks.lock().await.extend(handles);
        tracing::info!(instruments = ?symbols, "Engine started");
        Ok(())
    }

    fn spawn_ingest(
        &self,
        symbol: String,
        mut ticks: tokio::sync::mpsc::Receiver<TradeTick>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    tick = ticks.recv() => match tick {
                        Some(tick) => {
                            if let Err(e) = engine.ingest(&tick).await {
                                tracing::debug!(instrument = %symbol, error = %e, "Tick not routed");
                            }
                        }
                        None => {
                            tracing::info!(instrument = %symbol, "Trade feed closed");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    fn spawn_window_timer(&self, symbol: String, kind: WindowKind) -> Option<JoinHandle<()>> {
        let period = kind.duration()?.to_std().ok()?;
        let engine = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = engine.compute_window(&symbol, kind).await {
                            tracing::warn!(instrument = %symbol, error = %e, "Window timer stopping");
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }))
    }

    fn spawn_cycle_timer(&self, symbol: String) -> JoinHandle<()> {
        let engine = self.clone();
        let period = self.inner.config.detection.cycle_interval();
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match engine.run_cycle(&symbol).await {
                        Ok(_) | Err(DetectionError::UpstreamUnavailable { .. }) => {}
                        Err(e) => {
                            tracing::warn!(instrument = %symbol, error = %e, "Detection timer stopping");
                            break;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Signal shutdown and cancel all timers; safe to call repeatedly
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.send_replace(true);
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().await.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!(tasks = handles.len(), "Engine stopped");
    }
}
