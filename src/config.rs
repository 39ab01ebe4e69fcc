//! Configuration types for smart-money
//!
//! Every field carries a documented default so an empty file is a valid
//! configuration. [`Config::validated`] replaces any section that fails its
//! checks with that section's defaults instead of refusing to start.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration section
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid [{section}] configuration: {reason}")]
pub struct ConfigError {
    pub section: &'static str,
    pub reason: String,
}

/// Upper bound for every duration setting (ten years)
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 3600;

/// Whole seconds as a chrono duration, saturating at `TimeDelta::MAX`
pub fn chrono_secs(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn check_duration(section: &'static str, name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs > MAX_DURATION_SECS {
        return Err(ConfigError::new(
            section,
            format!("{name} exceeds {MAX_DURATION_SECS} seconds"),
        ));
    }
    Ok(())
}

impl ConfigError {
    fn new(section: &'static str, reason: impl Into<String>) -> Self {
        Self {
            section,
            reason: reason.into(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub delta: DeltaConfig,
    #[serde(default)]
    pub orders: OrderConfig,
    #[serde(default)]
    pub phase: PhaseConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Live trade feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Exchange name (only "binance" is wired)
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Instruments to monitor
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// WebSocket base URL for aggregated trade streams
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_exchange() -> String {
    "binance".to_string()
}
fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}
fn default_ws_url() -> String {
    "wss://fstream.binance.com/ws".to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            symbols: default_symbols(),
            ws_url: default_ws_url(),
        }
    }
}

/// Exchange REST snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Order-book depth requested per snapshot
    #[serde(default = "default_depth_limit")]
    pub depth_limit: usize,
}

fn default_rest_url() -> String {
    "https://fapi.binance.com".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_depth_limit() -> usize {
    100
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            timeout_secs: default_timeout_secs(),
            depth_limit: default_depth_limit(),
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rest_url.is_empty() {
            return Err(ConfigError::new("exchange", "rest_url is empty"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::new("exchange", "timeout_secs must be > 0"));
        }
        check_duration("exchange", "timeout_secs", self.timeout_secs)?;
        if self.depth_limit == 0 {
            return Err(ConfigError::new("exchange", "depth_limit must be > 0"));
        }
        Ok(())
    }
}

/// Indicator and fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Candle interval requested from the exchange
    #[serde(default = "default_kline_interval")]
    pub kline_interval: String,
    /// Number of candles requested per snapshot
    #[serde(default = "default_kline_limit")]
    pub kline_limit: usize,
    /// Epoch length of the realtime buy/sell counters (hours)
    #[serde(default = "default_cvd_window_hours")]
    pub cvd_window_hours: u64,
    /// Indicator refresh interval (seconds)
    #[serde(default = "default_refresh_interval_sec")]
    pub refresh_interval_sec: u64,
    /// Phase evaluation cycle (seconds)
    #[serde(default = "default_cycle_interval_sec")]
    pub cycle_interval_sec: u64,
    /// Book levels per side used for OBI and impact ratios
    #[serde(default = "default_obi_top_n")]
    pub obi_top_n: usize,
    /// Rolling history length for z-scores
    #[serde(default = "default_dyn_window")]
    pub dyn_window: usize,
    /// Candles used for the CVD proxy
    #[serde(default = "default_cvd_lookback")]
    pub cvd_lookback: usize,
    /// Minimum candles before the price/CVD path is trusted
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    /// Close-to-close move (percent) still considered flat
    #[serde(default = "default_flat_price_pct")]
    pub flat_price_pct: f64,
    /// |smartScore| at which the indicator path counts as strong
    #[serde(default = "default_contradiction_score")]
    pub contradiction_score: f64,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub weights: Weights,
}

fn default_kline_interval() -> String {
    "15m".to_string()
}
fn default_kline_limit() -> usize {
    200
}
fn default_cvd_window_hours() -> u64 {
    4
}
fn default_refresh_interval_sec() -> u64 {
    900
}
fn default_cycle_interval_sec() -> u64 {
    15
}
fn default_obi_top_n() -> usize {
    20
}
fn default_dyn_window() -> usize {
    12
}
fn default_cvd_lookback() -> usize {
    50
}
fn default_min_candles() -> usize {
    5
}
fn default_flat_price_pct() -> f64 {
    0.2
}
fn default_contradiction_score() -> f64 {
    0.8
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            kline_interval: default_kline_interval(),
            kline_limit: default_kline_limit(),
            cvd_window_hours: default_cvd_window_hours(),
            refresh_interval_sec: default_refresh_interval_sec(),
            cycle_interval_sec: default_cycle_interval_sec(),
            obi_top_n: default_obi_top_n(),
            dyn_window: default_dyn_window(),
            cvd_lookback: default_cvd_lookback(),
            min_candles: default_min_candles(),
            flat_price_pct: default_flat_price_pct(),
            contradiction_score: default_contradiction_score(),
            thresholds: Thresholds::default(),
            weights: Weights::default(),
        }
    }
}

impl DetectionConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_sec)
    }

    pub fn cvd_epoch(&self) -> chrono::Duration {
        chrono_secs(self.cvd_window_hours.saturating_mul(3600))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| Err(ConfigError::new("detection", reason));
        if self.kline_interval.is_empty() {
            return fail("kline_interval is empty");
        }
        if self.kline_limit < 2 {
            return fail("kline_limit must be >= 2");
        }
        if self.cvd_window_hours == 0 {
            return fail("cvd_window_hours must be > 0");
        }
        if self.refresh_interval_sec == 0 || self.cycle_interval_sec == 0 {
            return fail("intervals must be > 0");
        }
        check_duration(
            "detection",
            "cvd_window_hours",
            self.cvd_window_hours.saturating_mul(3600),
        )?;
        check_duration("detection", "refresh_interval_sec", self.refresh_interval_sec)?;
        check_duration("detection", "cycle_interval_sec", self.cycle_interval_sec)?;
        if self.obi_top_n == 0 {
            return fail("obi_top_n must be > 0");
        }
        if self.dyn_window < 2 {
            return fail("dyn_window must be >= 2");
        }
        if self.cvd_lookback < 2 || self.min_candles < 2 {
            return fail("cvd_lookback and min_candles must be >= 2");
        }
        if !self.flat_price_pct.is_finite() || self.flat_price_pct < 0.0 {
            return fail("flat_price_pct must be finite and >= 0");
        }
        if !self.contradiction_score.is_finite() || self.contradiction_score <= 0.0 {
            return fail("contradiction_score must be finite and > 0");
        }
        Ok(())
    }
}

/// Z-score thresholds (in standard deviations)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_obi_z")]
    pub obi_z: f64,
    #[serde(default = "default_flow_z")]
    pub cvd_z: f64,
    #[serde(default = "default_flow_z")]
    pub oi_z: f64,
    #[serde(default = "default_flow_z")]
    pub vol_z: f64,
}

fn default_obi_z() -> f64 {
    1.0
}
fn default_flow_z() -> f64 {
    0.8
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            obi_z: 1.0,
            cvd_z: 0.8,
            oi_z: 0.8,
            vol_z: 0.8,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.obi_z, self.cvd_z, self.oi_z, self.vol_z];
        if all.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ConfigError::new(
                "detection.thresholds",
                "thresholds must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Fusion weights for the smart score (need not sum to 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_order_weight")]
    pub order: f64,
    #[serde(default = "default_cvd_weight")]
    pub cvd: f64,
    #[serde(default = "default_oi_weight")]
    pub oi: f64,
    #[serde(default = "default_delta_weight")]
    pub delta: f64,
}

fn default_order_weight() -> f64 {
    0.4
}
fn default_cvd_weight() -> f64 {
    0.3
}
fn default_oi_weight() -> f64 {
    0.2
}
fn default_delta_weight() -> f64 {
    0.1
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            order: 0.4,
            cvd: 0.3,
            oi: 0.2,
            delta: 0.1,
        }
    }
}

impl Weights {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.order, self.cvd, self.oi, self.delta];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::new(
                "detection.weights",
                "weights must be finite and >= 0",
            ));
        }
        if all.iter().all(|w| *w == 0.0) {
            return Err(ConfigError::new("detection.weights", "all weights are zero"));
        }
        Ok(())
    }
}

/// Delta aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// Trailing trade buffer length (seconds, at least one hour)
    #[serde(default = "default_trailing_window_secs")]
    pub trailing_window_secs: u64,
    /// EMA period for the 15-minute window
    #[serde(default = "default_fifteen_minute_period")]
    pub fifteen_minute_period: usize,
    /// EMA period for the 1-hour window
    #[serde(default = "default_one_hour_period")]
    pub one_hour_period: usize,
    /// Raw samples kept per window for smoothing
    #[serde(default = "default_smoothing_history")]
    pub smoothing_history: usize,
    /// Hard cap on buffered trades per instrument
    #[serde(default = "default_max_buffered_trades")]
    pub max_buffered_trades: usize,
}

fn default_trailing_window_secs() -> u64 {
    3600
}
fn default_fifteen_minute_period() -> usize {
    3
}
fn default_one_hour_period() -> usize {
    6
}
fn default_smoothing_history() -> usize {
    20
}
fn default_max_buffered_trades() -> usize {
    500_000
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            trailing_window_secs: default_trailing_window_secs(),
            fifteen_minute_period: default_fifteen_minute_period(),
            one_hour_period: default_one_hour_period(),
            smoothing_history: default_smoothing_history(),
            max_buffered_trades: default_max_buffered_trades(),
        }
    }
}

impl DeltaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| Err(ConfigError::new("delta", reason));
        if self.trailing_window_secs < 3600 {
            return fail("trailing_window_secs must cover at least one hour");
        }
        check_duration("delta", "trailing_window_secs", self.trailing_window_secs)?;
        if self.fifteen_minute_period == 0 || self.one_hour_period == 0 {
            return fail("EMA periods must be > 0");
        }
        if self.smoothing_history < self.fifteen_minute_period.max(self.one_hour_period) {
            return fail("smoothing_history must be >= the largest EMA period");
        }
        if self.max_buffered_trades == 0 {
            return fail("max_buffered_trades must be > 0");
        }
        Ok(())
    }
}

/// Large resting order tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Minimum notional (quote currency) for a level to be tracked
    #[serde(default = "default_large_order_notional")]
    pub large_order_notional: f64,
    /// Snapshots an order must survive to count as persistent
    #[serde(default = "default_persist_snapshots")]
    pub persist_snapshots: u32,
    /// Lifetime below which a withdrawn order is treated as a spoof (seconds)
    #[serde(default = "default_spoof_window_secs")]
    pub spoof_window_secs: u64,
    /// Impact ratio at which an unclassified order is suspicious
    #[serde(default = "default_impact_ratio_threshold")]
    pub impact_ratio_threshold: f64,
    /// Observed fill fraction of posted size that counts as a sweep
    #[serde(default = "default_sweep_fill_ratio")]
    pub sweep_fill_ratio: f64,
    /// Relative price tolerance when matching trades to tracked orders
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: f64,
    /// Maximum tracked orders per instrument
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,
    /// Withdrawn orders are retired after this long (seconds)
    #[serde(default = "default_retire_after_secs")]
    pub retire_after_secs: u64,
    /// Orders seen within this window feed the order signal (seconds)
    #[serde(default = "default_signal_window_secs")]
    pub signal_window_secs: u64,
    /// One side must outweigh the other by this factor to set an action
    #[serde(default = "default_dominance_ratio")]
    pub dominance_ratio: f64,
    /// buy+sell score above which the order signal dominates
    #[serde(default = "default_strong_order_strength")]
    pub strong_order_strength: f64,
    /// Buy/sell separation that earns the confidence boost
    #[serde(default = "default_separation_boost_ratio")]
    pub separation_boost_ratio: f64,
}

fn default_large_order_notional() -> f64 {
    1_000_000.0
}
fn default_persist_snapshots() -> u32 {
    3
}
fn default_spoof_window_secs() -> u64 {
    60
}
fn default_impact_ratio_threshold() -> f64 {
    0.25
}
fn default_sweep_fill_ratio() -> f64 {
    0.30
}
fn default_price_tolerance() -> f64 {
    0.0005
}
fn default_max_tracked() -> usize {
    100
}
fn default_retire_after_secs() -> u64 {
    3600
}
fn default_signal_window_secs() -> u64 {
    900
}
fn default_dominance_ratio() -> f64 {
    1.5
}
fn default_strong_order_strength() -> f64 {
    5.0
}
fn default_separation_boost_ratio() -> f64 {
    0.6
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            large_order_notional: default_large_order_notional(),
            persist_snapshots: default_persist_snapshots(),
            spoof_window_secs: default_spoof_window_secs(),
            impact_ratio_threshold: default_impact_ratio_threshold(),
            sweep_fill_ratio: default_sweep_fill_ratio(),
            price_tolerance: default_price_tolerance(),
            max_tracked: default_max_tracked(),
            retire_after_secs: default_retire_after_secs(),
            signal_window_secs: default_signal_window_secs(),
            dominance_ratio: default_dominance_ratio(),
            strong_order_strength: default_strong_order_strength(),
            separation_boost_ratio: default_separation_boost_ratio(),
        }
    }
}

impl OrderConfig {
    pub fn spoof_window(&self) -> chrono::Duration {
        chrono_secs(self.spoof_window_secs)
    }

    pub fn retire_after(&self) -> chrono::Duration {
        chrono_secs(self.retire_after_secs)
    }

    pub fn signal_window(&self) -> chrono::Duration {
        chrono_secs(self.signal_window_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| Err(ConfigError::new("orders", reason));
        let positive = [
            self.large_order_notional,
            self.impact_ratio_threshold,
            self.dominance_ratio,
            self.strong_order_strength,
        ];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return fail("notional, impact, dominance and strength must be finite and > 0");
        }
        let ratios = [
            self.sweep_fill_ratio,
            self.price_tolerance,
            self.separation_boost_ratio,
        ];
        if ratios.iter().any(|v| !v.is_finite() || *v <= 0.0 || *v > 1.0) {
            return fail("ratios must lie in (0, 1]");
        }
        if self.persist_snapshots == 0 || self.max_tracked == 0 {
            return fail("persist_snapshots and max_tracked must be > 0");
        }
        check_duration("orders", "spoof_window_secs", self.spoof_window_secs)?;
        check_duration("orders", "retire_after_secs", self.retire_after_secs)?;
        check_duration("orders", "signal_window_secs", self.signal_window_secs)?;
        Ok(())
    }
}

/// Candidate/confirm state machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Consecutive matching cycles required before promotion
    #[serde(default = "default_min_persistence_cycles")]
    pub min_persistence_cycles: u32,
    /// Minimum candidate age before promotion (seconds)
    #[serde(default = "default_min_persistence_secs")]
    pub min_persistence_secs: u64,
    /// Minimum signal confidence for promotion
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Unconfirmed candidates older than this are discarded (seconds)
    #[serde(default = "default_candidate_max_age_secs")]
    pub candidate_max_age_secs: u64,
}

fn default_min_persistence_cycles() -> u32 {
    3
}
fn default_min_persistence_secs() -> u64 {
    30
}
fn default_min_confidence() -> f64 {
    0.5
}
fn default_candidate_max_age_secs() -> u64 {
    600
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            min_persistence_cycles: default_min_persistence_cycles(),
            min_persistence_secs: default_min_persistence_secs(),
            min_confidence: default_min_confidence(),
            candidate_max_age_secs: default_candidate_max_age_secs(),
        }
    }
}

impl PhaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: &str| Err(ConfigError::new("phase", reason));
        if self.min_persistence_cycles == 0 {
            return fail("min_persistence_cycles must be > 0");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return fail("min_confidence must lie in [0, 1]");
        }
        if self.candidate_max_age_secs <= self.min_persistence_secs {
            return fail("candidate_max_age_secs must exceed min_persistence_secs");
        }
        check_duration("phase", "candidate_max_age_secs", self.candidate_max_age_secs)?;
        Ok(())
    }
}

/// Downstream action rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Minimum minutes between actions for one instrument+purpose
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// Maximum actions per local day for one instrument+purpose
    #[serde(default = "default_max_daily_actions")]
    pub max_daily_actions: u32,
}

fn default_cooldown_minutes() -> u64 {
    30
}
fn default_max_daily_actions() -> u32 {
    5
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: default_cooldown_minutes(),
            max_daily_actions: default_max_daily_actions(),
        }
    }
}

impl CooldownConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_daily_actions == 0 {
            return Err(ConfigError::new("cooldown", "max_daily_actions must be > 0"));
        }
        check_duration(
            "cooldown",
            "cooldown_minutes",
            self.cooldown_minutes.saturating_mul(60),
        )?;
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port (0 disables the exporter)
    #[serde(default)]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: 0,
        }
    }
}

impl Config {
    /// Parse a TOML file without validating it
    pub fn read(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        Ok(Self::read(path)?.validated())
    }

    /// Replace every invalid section with its documented defaults
    pub fn validated(self) -> Self {
        let (config, errors) = self.sanitized();
        for e in &errors {
            tracing::warn!(
                kind = "ConfigurationInvalid",
                section = e.section,
                error = %e,
                "Falling back to default configuration section"
            );
        }
        config
    }

    /// Like [`validated`](Self::validated) but returns the rejected sections
    /// instead of logging them
    pub fn sanitized(mut self) -> (Self, Vec<ConfigError>) {
        let mut errors = Vec::new();
        if let Err(e) = self.exchange.validate() {
            errors.push(e);
            self.exchange = ExchangeConfig::default();
        }
        if let Err(e) = self.detection.thresholds.validate() {
            errors.push(e);
            self.detection.thresholds = Thresholds::default();
        }
        if let Err(e) = self.detection.weights.validate() {
            errors.push(e);
            self.detection.weights = Weights::default();
        }
        if let Err(e) = self.detection.validate() {
            errors.push(e);
            let thresholds = self.detection.thresholds;
            let weights = self.detection.weights;
            self.detection = DetectionConfig {
                thresholds,
                weights,
                ..DetectionConfig::default()
            };
        }
        if let Err(e) = self.delta.validate() {
            errors.push(e);
            self.delta = DeltaConfig::default();
        }
        if let Err(e) = self.orders.validate() {
            errors.push(e);
            self.orders = OrderConfig::default();
        }
        if let Err(e) = self.phase.validate() {
            errors.push(e);
            self.phase = PhaseConfig::default();
        }
        if let Err(e) = self.cooldown.validate() {
            errors.push(e);
            self.cooldown = CooldownConfig::default();
        }
        (self, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.detection.kline_interval, "15m");
        assert_eq!(config.detection.dyn_window, 12);
        assert_eq!(config.detection.obi_top_n, 20);
        assert_eq!(config.detection.refresh_interval_sec, 900);
        assert_eq!(config.detection.weights, Weights::default());
        assert_eq!(config.feed.symbols.len(), 3);
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [feed]
            symbols = ["BTCUSDT"]

            [detection]
            dyn_window = 20
            cycle_interval_sec = 30

            [detection.thresholds]
            cvd_z = 1.2

            [detection.weights]
            order = 0.5
            cvd = 0.5
            oi = 0.0
            delta = 0.0

            [phase]
            min_persistence_cycles = 4

            [telemetry]
            log_level = "debug"
            log_format = "json"
            metrics_port = 9090
        "#;

        let config = toml::from_str::<Config>(toml).unwrap().validated();
        assert_eq!(config.feed.symbols, vec!["BTCUSDT".to_string()]);
        assert_eq!(config.detection.dyn_window, 20);
        assert_eq!(config.detection.thresholds.cvd_z, 1.2);
        assert_eq!(config.detection.thresholds.oi_z, 0.8);
        assert_eq!(config.detection.weights.order, 0.5);
        assert_eq!(config.phase.min_persistence_cycles, 4);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
        assert_eq!(config.telemetry.metrics_port, 9090);
    }

    #[test]
    fn test_negative_weights_fall_back() {
        let toml = r#"
            [detection.weights]
            order = -1.0
        "#;
        let config = toml::from_str::<Config>(toml).unwrap().validated();
        assert_eq!(config.detection.weights, Weights::default());
    }

    #[test]
    fn test_zero_weights_fall_back() {
        let mut config = Config::default();
        config.detection.weights = Weights {
            order: 0.0,
            cvd: 0.0,
            oi: 0.0,
            delta: 0.0,
        };
        let config = config.validated();
        assert_eq!(config.detection.weights, Weights::default());
    }

    #[test]
    fn test_invalid_thresholds_fall_back() {
        let mut config = Config::default();
        config.detection.thresholds.obi_z = f64::NAN;
        let config = config.validated();
        assert_eq!(config.detection.thresholds, Thresholds::default());
    }

    #[test]
    fn test_invalid_detection_keeps_valid_weights() {
        let mut config = Config::default();
        config.detection.dyn_window = 1;
        config.detection.weights.order = 0.9;
        let config = config.validated();
        assert_eq!(config.detection.dyn_window, 12);
        assert_eq!(config.detection.weights.order, 0.9);
    }

    #[test]
    fn test_invalid_phase_falls_back() {
        let mut config = Config::default();
        config.phase.min_confidence = 1.5;
        let config = config.validated();
        assert_eq!(config.phase.min_confidence, 0.5);
    }

    #[test]
    fn test_invalid_delta_falls_back() {
        let mut config = Config::default();
        config.delta.trailing_window_secs = 60;
        let config = config.validated();
        assert_eq!(config.delta.trailing_window_secs, 3600);
    }

    #[test]
    fn test_oversized_durations_fall_back() {
        let mut config = Config::default();
        config.detection.cvd_window_hours = 1 << 50;
        config.orders.spoof_window_secs = u64::MAX;
        config.phase.candidate_max_age_secs = u64::MAX;
        config.cooldown.cooldown_minutes = 1 << 60;
        config.delta.trailing_window_secs = u64::MAX;

        let (config, errors) = config.sanitized();
        let sections: Vec<_> = errors.iter().map(|e| e.section).collect();
        assert_eq!(sections, ["detection", "delta", "orders", "phase", "cooldown"]);
        assert_eq!(config.detection.cvd_window_hours, 4);
        assert_eq!(config.detection.cvd_epoch(), chrono::Duration::hours(4));
        assert_eq!(config.orders.spoof_window_secs, 60);
        assert_eq!(config.phase.candidate_max_age_secs, 600);
        assert_eq!(config.cooldown.cooldown_minutes, 30);
        assert_eq!(config.delta.trailing_window_secs, 3600);
    }

    #[test]
    fn test_chrono_secs_saturates() {
        assert_eq!(chrono_secs(90), chrono::Duration::seconds(90));
        assert_eq!(chrono_secs(u64::MAX), chrono::Duration::MAX);
    }

    #[test]
    fn test_valid_config_reports_no_errors() {
        let (_, errors) = Config::default().sanitized();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::new("orders", "bad ratio");
        assert_eq!(err.to_string(), "invalid [orders] configuration: bad ratio");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cooldown]\ncooldown_minutes = 5\nmax_daily_actions = 2").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cooldown.cooldown_minutes, 5);
        assert_eq!(config.cooldown.max_daily_actions, 2);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.detection.kline_limit, config.detection.kline_limit);
    }
}
