//! Integration tests for the trade feed

use smart_money::feed::{BinanceTradeFeed, TradeFeed};
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test]
async fn test_feed_closes_on_shutdown() {
    // Nothing listens on the discard port, so the client keeps reconnecting
    let feed = BinanceTradeFeed::new("ws://127.0.0.1:9");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut ticks = feed.subscribe("BTCUSDT", shutdown_rx).await.unwrap();
    shutdown_tx.send(true).unwrap();

    let closed = tokio::time::timeout(Duration::from_secs(10), ticks.recv())
        .await
        .expect("feed did not close after shutdown");
    assert!(closed.is_none());
}
