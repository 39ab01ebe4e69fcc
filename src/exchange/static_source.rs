//! Scripted snapshot source

use super::types::{ExchangeError, MarketSnapshot};
use super::SnapshotSource;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// In-memory [`SnapshotSource`] replaying queued responses per symbol
///
/// Once a symbol's queue is drained the last successful snapshot repeats;
/// a symbol with no history yields [`ExchangeError::Unavailable`].
#[derive(Default)]
pub struct StaticSource {
    inner: Mutex<HashMap<String, Script>>,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<MarketSnapshot, ExchangeError>>,
    last: Option<MarketSnapshot>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn scripts(&self) -> MutexGuard<'_, HashMap<String, Script>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a snapshot for its symbol
    pub fn push(&self, snapshot: MarketSnapshot) {
        self.push_result(&snapshot.symbol.clone(), Ok(snapshot));
    }

    /// Queue a failure for `symbol`
    pub fn push_error(&self, symbol: &str, error: ExchangeError) {
        self.push_result(symbol, Err(error));
    }

    fn push_result(&self, symbol: &str, result: Result<MarketSnapshot, ExchangeError>) {
        self.scripts()
            .entry(symbol.to_string())
            .or_default()
            .queue
            .push_back(result);
    }

    /// Responses still queued for `symbol`
    pub fn pending(&self, symbol: &str) -> usize {
        self.scripts().get(symbol).map_or(0, |s| s.queue.len())
    }
}

#[async_trait]
impl SnapshotSource for StaticSource {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<MarketSnapshot, ExchangeError> {
        let mut scripts = self.scripts();
        let script = scripts.entry(symbol.to_string()).or_default();

        match script.queue.pop_front() {
            Some(Ok(snapshot)) => {
                script.last = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => script
                .last
                .clone()
                .ok_or_else(|| ExchangeError::Unavailable(symbol.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(symbol: &str, oi: f64) -> MarketSnapshot {
        MarketSnapshot {
            symbol: symbol.to_string(),
            open_interest: Some(oi),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_replays_then_repeats_last() {
        let source = StaticSource::new();
        source.push(snap("BTCUSDT", 1.0));
        source.push_error("BTCUSDT", ExchangeError::Http("timeout".into()));
        source.push(snap("BTCUSDT", 2.0));

        assert_eq!(source.fetch_snapshot("BTCUSDT").await.unwrap().open_interest, Some(1.0));
        assert!(source.fetch_snapshot("BTCUSDT").await.is_err());
        assert_eq!(source.fetch_snapshot("BTCUSDT").await.unwrap().open_interest, Some(2.0));
        assert_eq!(source.fetch_snapshot("BTCUSDT").await.unwrap().open_interest, Some(2.0));
        assert_eq!(source.pending("BTCUSDT"), 0);
    }

    #[test]
    fn test_unknown_symbol_unavailable() {
        let source = StaticSource::new();
        assert_eq!(
            tokio_test::block_on(source.fetch_snapshot("ETHUSDT")),
            Err(ExchangeError::Unavailable("ETHUSDT".into()))
        );
    }

    #[test]
    fn test_poisoned_lock_still_queues() {
        let source = std::sync::Arc::new(StaticSource::new());
        let holder = std::sync::Arc::clone(&source);
        let _ = std::thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("poison the script lock");
        })
        .join();
        assert!(source.inner.is_poisoned());

        source.push(snap("BTCUSDT", 3.0));
        assert_eq!(source.pending("BTCUSDT"), 1);
        assert_eq!(
            tokio_test::block_on(source.fetch_snapshot("BTCUSDT")).map(|s| s.open_interest),
            Ok(Some(3.0))
        );
    }
}
