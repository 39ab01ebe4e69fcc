//! Prometheus metrics

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Trade ticks accepted by the delta aggregator
    TicksIngested,
    /// Malformed trade ticks dropped
    TicksDropped,
    /// Detection cycles completed
    Cycles,
    /// Candidate events emitted
    Candidates,
    /// Phase change events emitted
    PhaseChanges,
    /// Per-instrument pipeline errors
    Errors,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::TicksIngested => "smartmoney_ticks_ingested_total",
            CounterMetric::TicksDropped => "smartmoney_ticks_dropped_total",
            CounterMetric::Cycles => "smartmoney_cycles_total",
            CounterMetric::Candidates => "smartmoney_candidates_total",
            CounterMetric::PhaseChanges => "smartmoney_phase_changes_total",
            CounterMetric::Errors => "smartmoney_errors_total",
        }
    }
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    /// Confidence of the latest integrated signal
    Confidence,
    /// Latest funding rate
    FundingRate,
}

impl GaugeMetric {
    pub fn name(self) -> &'static str {
        match self {
            GaugeMetric::Confidence => "smartmoney_confidence",
            GaugeMetric::FundingRate => "smartmoney_funding_rate",
        }
    }
}

/// Increment a per-instrument counter
pub fn incr_counter(metric: CounterMetric, instrument: &str) {
    metrics::counter!(metric.name(), "instrument" => instrument.to_string()).increment(1);
}

/// Set a per-instrument gauge value
pub fn set_gauge(metric: GaugeMetric, instrument: &str, value: f64) {
    metrics::gauge!(metric.name(), "instrument" => instrument.to_string()).set(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        let counters = [
            CounterMetric::TicksIngested,
            CounterMetric::TicksDropped,
            CounterMetric::Cycles,
            CounterMetric::Candidates,
            CounterMetric::PhaseChanges,
            CounterMetric::Errors,
        ];
        for c in counters {
            assert!(c.name().starts_with("smartmoney_"));
            assert!(c.name().ends_with("_total"));
        }
        assert_eq!(GaugeMetric::Confidence.name(), "smartmoney_confidence");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        incr_counter(CounterMetric::Cycles, "BTCUSDT");
        set_gauge(GaugeMetric::Confidence, "BTCUSDT", 0.7);
    }
}
