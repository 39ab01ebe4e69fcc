//! Trade-stream aggregation into smoothed directional flow

use super::types::{DeltaSample, DeltaSnapshot, FlowCounter, TickError, WindowKind};
use crate::config::{chrono_secs, DeltaConfig};
use crate::feed::TradeTick;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use std::collections::VecDeque;

/// Exponential moving average seeded with the first value
///
/// Returns `None` for an empty input.
pub fn ema(values: impl IntoIterator<Item = f64>, period: usize) -> Option<f64> {
    let k = 2.0 / (period.max(1) as f64 + 1.0);
    values
        .into_iter()
        .fold(None, |acc, v| Some(acc.map_or(v, |prev| v * k + prev * (1.0 - k))))
}

#[derive(Debug, Clone, Copy)]
struct BufferedTrade {
    time: DateTime<Utc>,
    qty: f64,
    taker_buy: bool,
}

/// Bounded raw-sample history for one window kind
#[derive(Debug, Clone)]
struct Smoother {
    period: usize,
    capacity: usize,
    raw: VecDeque<f64>,
    smoothed: Option<f64>,
}

impl Smoother {
    fn new(period: usize, capacity: usize) -> Self {
        Self {
            period,
            capacity: capacity.max(1),
            raw: VecDeque::with_capacity(capacity),
            smoothed: None,
        }
    }

    fn push(&mut self, raw: f64) -> Option<f64> {
        self.raw.push_back(raw);
        while self.raw.len() > self.capacity {
            self.raw.pop_front();
        }
        self.smoothed = ema(self.raw.iter().copied(), self.period).map(|v| v.clamp(-1.0, 1.0));
        self.smoothed
    }
}

/// Per-instrument delta aggregator
///
/// Owns the trailing trade buffer, the realtime epoch counters and one
/// smoothing history per timed window.
#[derive(Debug, Clone)]
pub struct DeltaAggregator {
    instrument: String,
    trailing: Duration,
    max_buffered: usize,
    epoch_len: Duration,
    trades: VecDeque<BufferedTrade>,
    latest: Option<DateTime<Utc>>,
    realtime: FlowCounter,
    epoch_start: Option<DateTime<Utc>>,
    fifteen: Smoother,
    hourly: Smoother,
}

impl DeltaAggregator {
    /// `epoch_len` is how long the realtime counters accumulate before resetting
    pub fn new(instrument: impl Into<String>, config: &DeltaConfig, epoch_len: Duration) -> Self {
        Self {
            instrument: instrument.into(),
            trailing: chrono_secs(config.trailing_window_secs),
            max_buffered: config.max_buffered_trades,
            epoch_len,
            trades: VecDeque::new(),
            latest: None,
            realtime: FlowCounter::default(),
            epoch_start: None,
            fifteen: Smoother::new(config.fifteen_minute_period, config.smoothing_history),
            hourly: Smoother::new(config.one_hour_period, config.smoothing_history),
        }
    }

    pub fn with_defaults(instrument: impl Into<String>) -> Self {
        Self::new(instrument, &DeltaConfig::default(), Duration::hours(4))
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Accept one trade tick
    ///
    /// Rejected ticks leave every aggregate untouched.
    pub fn ingest(&mut self, tick: &TradeTick) -> Result<(), TickError> {
        if !tick.symbol.eq_ignore_ascii_case(&self.instrument) {
            return Err(TickError::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: tick.symbol.clone(),
            });
        }
        let qty = tick
            .qty
            .to_f64()
            .filter(|q| q.is_finite() && *q > 0.0)
            .ok_or(TickError::InvalidSize(tick.qty))?;

        match self.epoch_start {
            Some(start) if tick.time - start < self.epoch_len => {}
            _ => {
                self.realtime = FlowCounter::default();
                self.epoch_start = Some(tick.time);
            }
        }
        self.realtime.record(qty, tick.is_taker_buy());

        self.trades.push_back(BufferedTrade {
            time: tick.time,
            qty,
            taker_buy: tick.is_taker_buy(),
        });
        let latest = self.latest.map_or(tick.time, |l| l.max(tick.time));
        self.latest = Some(latest);
        self.prune(latest);

        Ok(())
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while self.trades.front().is_some_and(|t| now - t.time > self.trailing) {
            self.trades.pop_front();
        }
        while self.trades.len() > self.max_buffered {
            self.trades.pop_front();
        }
    }

    /// Compute the window ending at `now` and fold it into the smoothing history
    pub fn compute_window(&mut self, kind: WindowKind, now: DateTime<Utc>) -> DeltaSample {
        let Some(length) = kind.duration() else {
            let raw = self.realtime.delta();
            return DeltaSample {
                kind,
                raw_delta: raw,
                smoothed_delta: Some(raw),
                flow: self.realtime,
                computed_at: now,
            };
        };

        self.prune(now);
        let start = now - length;
        let mut flow = FlowCounter::default();
        for trade in self.trades.iter().filter(|t| t.time > start && t.time <= now) {
            flow.record(trade.qty, trade.taker_buy);
        }

        let raw = flow.delta();
        let smoothed = match kind {
            WindowKind::FifteenMinutes => self.fifteen.push(raw),
            _ => self.hourly.push(raw),
        };

        DeltaSample {
            kind,
            raw_delta: raw,
            smoothed_delta: smoothed,
            flow,
            computed_at: now,
        }
    }

    /// Latest smoothed value; `None` means unknown, not neutral
    pub fn smoothed(&self, kind: WindowKind) -> Option<f64> {
        match kind {
            WindowKind::Realtime => Some(self.realtime.delta()),
            WindowKind::FifteenMinutes => self.fifteen.smoothed,
            WindowKind::OneHour => self.hourly.smoothed,
        }
    }

    /// Realtime buy/sell counters for the current epoch
    pub fn realtime(&self) -> FlowCounter {
        self.realtime
    }

    pub fn buffered_trades(&self) -> usize {
        self.trades.len()
    }

    pub fn snapshot(&self) -> DeltaSnapshot {
        DeltaSnapshot {
            realtime: self.realtime.delta(),
            fifteen_minutes: self.fifteen.smoothed,
            one_hour: self.hourly.smoothed,
            buffered_trades: self.trades.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn tick(secs: i64, qty: Decimal, buyer_maker: bool) -> TradeTick {
        TradeTick::new(
            "BTCUSDT",
            dec!(42000),
            qty,
            t0() + Duration::seconds(secs),
            buyer_maker,
        )
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        assert_eq!(ema(Vec::<f64>::new(), 3), None);
        assert_eq!(ema(vec![0.4], 3), Some(0.4));
        // k = 0.5
        let v = ema(vec![0.0, 1.0], 3).unwrap();
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_buy_window_is_one() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        for i in 0..10 {
            agg.ingest(&tick(i, dec!(1.5), false)).unwrap();
        }
        let sample = agg.compute_window(WindowKind::FifteenMinutes, t0() + Duration::seconds(60));
        assert_eq!(sample.raw_delta, 1.0);
        assert_eq!(sample.smoothed_delta, Some(1.0));
    }

    #[test]
    fn test_all_sell_window_is_minus_one() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        for i in 0..10 {
            agg.ingest(&tick(i, dec!(0.2), true)).unwrap();
        }
        let sample = agg.compute_window(WindowKind::OneHour, t0() + Duration::seconds(60));
        assert_eq!(sample.raw_delta, -1.0);
    }

    #[test]
    fn test_empty_window_is_zero() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        let sample = agg.compute_window(WindowKind::FifteenMinutes, t0());
        assert_eq!(sample.raw_delta, 0.0);
        assert_eq!(sample.smoothed_delta, Some(0.0));
    }

    #[test]
    fn test_raw_delta_always_bounded() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        let sizes = [dec!(0.001), dec!(1000000), dec!(3.3), dec!(0.5), dec!(77)];
        for i in 0..200i64 {
            let qty = sizes[(i as usize * 7) % sizes.len()];
            agg.ingest(&tick(i * 3, qty, i % 3 == 0)).unwrap();
            if i % 20 == 0 {
                for kind in [WindowKind::Realtime, WindowKind::FifteenMinutes, WindowKind::OneHour] {
                    let s = agg.compute_window(kind, t0() + Duration::seconds(i * 3));
                    assert!((-1.0..=1.0).contains(&s.raw_delta));
                    let smoothed = s.smoothed_delta.unwrap();
                    assert!((-1.0..=1.0).contains(&smoothed));
                }
            }
        }
    }

    #[test]
    fn test_smoothed_none_before_first_sample() {
        let agg = DeltaAggregator::with_defaults("BTCUSDT");
        assert_eq!(agg.smoothed(WindowKind::FifteenMinutes), None);
        assert_eq!(agg.smoothed(WindowKind::OneHour), None);
    }

    #[test]
    fn test_ema_converges_under_constant_input() {
        let config = DeltaConfig::default();
        let mut agg = DeltaAggregator::new("BTCUSDT", &config, Duration::hours(4));
        agg.ingest(&tick(0, dec!(3), false)).unwrap();
        agg.ingest(&tick(1, dec!(1), true)).unwrap();
        let now = t0() + Duration::seconds(2);
        for _ in 0..config.fifteen_minute_period + 5 {
            let s = agg.compute_window(WindowKind::FifteenMinutes, now);
            assert!((s.smoothed_delta.unwrap() - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_trailing_buffer_pruned_to_one_hour() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        agg.ingest(&tick(0, dec!(1), false)).unwrap();
        agg.ingest(&tick(1800, dec!(1), false)).unwrap();
        assert_eq!(agg.buffered_trades(), 2);

        agg.ingest(&tick(3601, dec!(1), false)).unwrap();
        assert_eq!(agg.buffered_trades(), 2);
    }

    #[test]
    fn test_buffer_hard_cap() {
        let config = DeltaConfig {
            max_buffered_trades: 5,
            ..DeltaConfig::default()
        };
        let mut agg = DeltaAggregator::new("BTCUSDT", &config, Duration::hours(4));
        for i in 0..20 {
            agg.ingest(&tick(i, dec!(1), false)).unwrap();
        }
        assert_eq!(agg.buffered_trades(), 5);
        assert_eq!(agg.realtime().trades, 20);
    }

    #[test]
    fn test_window_excludes_old_trades() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        agg.ingest(&tick(0, dec!(5), true)).unwrap();
        agg.ingest(&tick(1000, dec!(1), false)).unwrap();

        let now = t0() + Duration::seconds(1001);
        let fifteen = agg.compute_window(WindowKind::FifteenMinutes, now);
        assert_eq!(fifteen.raw_delta, 1.0);

        let hourly = agg.compute_window(WindowKind::OneHour, now);
        assert!((hourly.raw_delta - (-4.0 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_tick_dropped_without_side_effects() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        agg.ingest(&tick(0, dec!(2), false)).unwrap();

        assert_eq!(
            agg.ingest(&tick(1, dec!(0), true)),
            Err(TickError::InvalidSize(dec!(0)))
        );
        assert!(agg.ingest(&tick(2, dec!(-1), true)).is_err());

        let mut other = tick(3, dec!(1), true);
        other.symbol = "ETHUSDT".to_string();
        assert!(matches!(
            agg.ingest(&other),
            Err(TickError::InstrumentMismatch { .. })
        ));

        assert_eq!(agg.buffered_trades(), 1);
        assert_eq!(agg.realtime().trades, 1);
        assert_eq!(agg.snapshot().realtime, 1.0);
    }

    #[test]
    fn test_realtime_counters_reset_each_epoch() {
        let config = DeltaConfig::default();
        let mut agg = DeltaAggregator::new("BTCUSDT", &config, Duration::minutes(30));
        agg.ingest(&tick(0, dec!(5), true)).unwrap();
        agg.ingest(&tick(60, dec!(1), false)).unwrap();
        assert_eq!(agg.realtime().trades, 2);

        agg.ingest(&tick(1800, dec!(1), false)).unwrap();
        assert_eq!(agg.realtime().trades, 1);
        assert_eq!(agg.smoothed(WindowKind::Realtime), Some(1.0));
    }

    #[test]
    fn test_smoothing_history_bounded() {
        let mut agg = DeltaAggregator::with_defaults("BTCUSDT");
        for i in 0..50 {
            agg.compute_window(WindowKind::OneHour, t0() + Duration::hours(i));
        }
        assert_eq!(agg.hourly.raw.len(), DeltaConfig::default().smoothing_history);
    }
}
