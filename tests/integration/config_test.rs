//! Integration tests for configuration loading

use smart_money::config::{Config, LogFormat};
use std::io::Write;

#[test]
fn test_example_config_matches_defaults() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    let defaults = Config::default();

    assert_eq!(config.feed.symbols, defaults.feed.symbols);
    assert_eq!(config.detection.thresholds, defaults.detection.thresholds);
    assert_eq!(config.detection.weights, defaults.detection.weights);
    assert_eq!(config.detection.cycle_interval_sec, 15);
    assert_eq!(config.delta.one_hour_period, 6);
    assert_eq!(config.phase.min_persistence_cycles, 3);
    assert_eq!(config.cooldown.max_daily_actions, 5);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
}

#[test]
fn test_invalid_section_falls_back() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [detection.weights]
        order = -1.0

        [phase]
        min_confidence = 0.7

        [cooldown]
        cooldown_minutes = 10
        "#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.detection.weights, Config::default().detection.weights);
    assert_eq!(config.phase.min_confidence, 0.7);
    assert_eq!(config.cooldown.cooldown_minutes, 10);
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.exchange.rest_url, "https://fapi.binance.com");
    assert_eq!(parsed.orders.large_order_notional, 1_000_000.0);
}

#[test]
fn test_read_defers_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[detection]\ncvd_window_hours = 1125899906842624").unwrap();

    let raw = Config::read(file.path()).unwrap();
    assert_eq!(raw.detection.cvd_window_hours, 1 << 50);

    let (config, errors) = raw.sanitized();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].section, "detection");
    assert_eq!(config.detection.cvd_window_hours, 4);
}
