//! Detect command implementation

use crate::config::Config;
use crate::cooldown::SystemClock;
use crate::engine::SmartMoneyEngine;
use crate::exchange::BinanceRest;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Instrument symbol, e.g. BTCUSDT
    pub symbol: String,
}

impl DetectArgs {
    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        config.feed.symbols = vec![self.symbol.clone()];
        let source = BinanceRest::new(&config.exchange, &config.detection)?;
        let engine = SmartMoneyEngine::new(config, source, Arc::new(SystemClock));

        let state = engine.trigger_detection(&self.symbol).await?;
        println!("{}", serde_json::to_string_pretty(&state)?);
        Ok(())
    }
}
