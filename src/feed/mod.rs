//! Trade feed module
//!
//! Streams executed trades per instrument from the exchange

mod binance;
mod types;

pub use binance::BinanceTradeFeed;
pub use types::TradeTick;

use crate::config::FeedConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Trait for trade feed implementations
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Subscribe to trades for `symbol` until `shutdown` flips to `true`
    async fn subscribe(
        &self,
        symbol: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<mpsc::Receiver<TradeTick>>;
}

/// Build the live trade feed named by `[feed].exchange`
pub fn from_config(config: &FeedConfig) -> anyhow::Result<Arc<dyn TradeFeed>> {
    match config.exchange.trim().to_ascii_lowercase().as_str() {
        "binance" => Ok(Arc::new(BinanceTradeFeed::new(config.ws_url.clone()))),
        other => anyhow::bail!("unsupported feed exchange: {other}"),
    }
}
