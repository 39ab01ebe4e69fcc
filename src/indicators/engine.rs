//! Per-instrument indicator history and z-score computation

use super::series::RollingSeries;
use super::types::{Direction, IndicatorSnapshot};
use crate::config::{chrono_secs, DetectionConfig};
use crate::delta::DeltaSnapshot;
use crate::exchange::{Candle, MarketSnapshot};
use chrono::{DateTime, Duration, Utc};

/// Σ sign(close_t − close_{t−1}) × volume_t over the last `lookback` candles
pub fn cumulative_volume_delta(candles: &[Candle], lookback: usize) -> f64 {
    let start = candles.len().saturating_sub(lookback);
    candles[start..]
        .windows(2)
        .map(|w| {
            let diff = w[1].close - w[0].close;
            if diff > 0.0 {
                w[1].volume
            } else if diff < 0.0 {
                -w[1].volume
            } else {
                0.0
            }
        })
        .filter(|v| v.is_finite())
        .sum()
}

/// Last close-to-close change in percent, 0 with fewer than two candles
pub fn price_change_pct(candles: &[Candle]) -> f64 {
    match candles {
        [.., prev, last] if prev.close != 0.0 => {
            let pct = (last.close - prev.close) / prev.close * 100.0;
            if pct.is_finite() {
                pct
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// A rolling series and the refresh interval it last committed in
#[derive(Debug, Clone)]
struct History {
    series: RollingSeries,
    committed: Option<u64>,
}

impl History {
    fn new(window: usize) -> Self {
        Self {
            series: RollingSeries::new(window),
            committed: None,
        }
    }

    /// Push the first value seen in `interval`, overwrite any later ones
    fn record(&mut self, value: f64, interval: u64) -> bool {
        if self.committed == Some(interval) {
            return self.series.replace_latest(value);
        }
        let pushed = self.series.push(value);
        if pushed {
            self.committed = Some(interval);
        }
        pushed
    }

    fn latest_zscore(&self) -> f64 {
        self.series.latest_zscore()
    }

    fn len(&self) -> usize {
        self.series.len()
    }
}

/// Rolling OBI, volume, OI, CVD and delta histories for one instrument
///
/// Histories advance one sample per refresh interval. Updates in between
/// overwrite the newest sample so z-scores always include the current value.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: DetectionConfig,
    refresh: Duration,
    last_commit: Option<DateTime<Utc>>,
    interval: u64,
    obi: History,
    volume: History,
    open_interest: History,
    cvd: History,
    delta: History,
    latest: Option<IndicatorSnapshot>,
}

impl IndicatorEngine {
    pub fn new(config: DetectionConfig) -> Self {
        let window = config.dyn_window;
        Self {
            refresh: chrono_secs(config.refresh_interval_sec),
            last_commit: None,
            interval: 0,
            config,
            obi: History::new(window),
            volume: History::new(window),
            open_interest: History::new(window),
            cvd: History::new(window),
            delta: History::new(window),
            latest: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DetectionConfig::default())
    }

    /// Fold one market snapshot and the current delta view into the histories
    ///
    /// Missing inputs contribute a neutral z-score of 0.
    pub fn update(
        &mut self,
        market: &MarketSnapshot,
        delta: &DeltaSnapshot,
        now: DateTime<Utc>,
    ) -> IndicatorSnapshot {
        if self.last_commit.map_or(true, |t| now - t >= self.refresh) {
            self.last_commit = Some(now);
            self.interval += 1;
        }
        let interval = self.interval;

        let candles = &market.candles;
        let data_sufficient = candles.len() >= self.config.min_candles;

        let change_pct = price_change_pct(candles);
        let price_direction = Direction::from_change_pct(change_pct, self.config.flat_price_pct);

        let (cvd, cvd_z, volume, vol_z) = match candles.last() {
            Some(last) => {
                let cvd = cumulative_volume_delta(candles, self.config.cvd_lookback);
                self.cvd.record(cvd, interval);
                self.volume.record(last.volume, interval);
                (
                    cvd,
                    self.cvd.latest_zscore(),
                    last.volume,
                    self.volume.latest_zscore(),
                )
            }
            None => (0.0, 0.0, 0.0, 0.0),
        };

        let obi = market
            .book
            .as_ref()
            .map(|b| b.imbalance(self.config.obi_top_n));
        let obi_z = Self::record_and_score(&mut self.obi, obi, interval);

        let oi_z = Self::record_and_score(&mut self.open_interest, market.open_interest, interval);

        let delta_value = delta.fifteen_minutes.unwrap_or(delta.realtime);
        let delta_z = Self::record_and_score(&mut self.delta, Some(delta_value), interval);

        if !data_sufficient {
            tracing::debug!(
                instrument = %market.symbol,
                candles = candles.len(),
                required = self.config.min_candles,
                "Insufficient candles, price/CVD path neutral"
            );
        }

        let snapshot = IndicatorSnapshot {
            price: market.last_close(),
            price_change_pct: change_pct,
            price_direction,
            obi,
            obi_z,
            cvd,
            cvd_z,
            open_interest: market.open_interest,
            oi_z,
            volume,
            vol_z,
            delta: delta_value,
            delta_z,
            funding_rate: market.funding_rate,
            data_sufficient,
            computed_at: now,
        };
        self.latest = Some(snapshot.clone());
        snapshot
    }

    fn record_and_score(history: &mut History, value: Option<f64>, interval: u64) -> f64 {
        match value {
            Some(v) if history.record(v, interval) => history.latest_zscore(),
            _ => 0.0,
        }
    }

    /// Most recent snapshot produced by [`update`](Self::update)
    pub fn latest(&self) -> Option<&IndicatorSnapshot> {
        self.latest.as_ref()
    }

    /// Number of cycles held in the shortest history
    pub fn history_len(&self) -> usize {
        self.cvd.len()
    }
}
