//! Run command implementation

use crate::config::Config;
use crate::cooldown::SystemClock;
use crate::engine::SmartMoneyEngine;
use crate::exchange::{BinanceRest, SnapshotSource};
use crate::phase::PhaseEvent;
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Symbols to watch, overriding `[feed].symbols`
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Cooldown purpose used to gate confirmed phases
    #[arg(long, default_value = "phase_change")]
    pub purpose: String,
}

impl RunArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        if !self.symbols.is_empty() {
            config.feed.symbols = self.symbols.clone();
        }

        let source = BinanceRest::new(&config.exchange, &config.detection)?;
        let feed = crate::feed::from_config(&config.feed)?;
        let engine = SmartMoneyEngine::new(config, source, Arc::new(SystemClock));

        let mut events = engine.subscribe();
        engine.start(feed).await?;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle(&engine, event).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event consumer lagging, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        engine.stop().await;
        let stats = engine.get_stats().await;
        tracing::info!(
            detections = stats.total_detections,
            phase_changes = stats.phase_changes,
            candidates = stats.candidates,
            errors = stats.errors,
            uptime_secs = stats.uptime_secs,
            "Final statistics"
        );
        Ok(())
    }

    /// Print events as JSON lines; confirmed phases pass the cooldown gate first
    async fn handle<S: SnapshotSource + 'static>(
        &self,
        engine: &SmartMoneyEngine<S>,
        event: PhaseEvent,
    ) -> anyhow::Result<()> {
        if event.is_phase_change() {
            let decision = engine.gate_action(event.instrument(), &self.purpose).await?;
            if !decision.allowed {
                tracing::info!(
                    instrument = %event.instrument(),
                    reason = %decision.reason,
                    remaining_secs = ?decision.remaining_secs,
                    "Phase change suppressed by cooldown"
                );
                return Ok(());
            }
        }
        println!("{}", serde_json::to_string(&event)?);
        Ok(())
    }
}
