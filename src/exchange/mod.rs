//! Exchange snapshot module
//!
//! Periodic candles, depth, open interest and funding per instrument

mod binance;
mod static_source;
mod types;

pub use binance::BinanceRest;
pub use static_source::StaticSource;
pub use types::{BookLevel, Candle, ExchangeError, MarketSnapshot, OrderBookSnapshot};

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for snapshot source implementations
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the latest snapshot for `symbol`
    ///
    /// Succeeds with partial data when only some parts are available.
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, ExchangeError>;
}

#[async_trait]
impl<S: SnapshotSource + ?Sized> SnapshotSource for Arc<S> {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, ExchangeError> {
        (**self).fetch_snapshot(symbol).await
    }
}
