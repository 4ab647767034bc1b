//! Prometheus Metric Sink
//!
//! Implements the `MetricSink` port on top of a dedicated Prometheus
//! `Registry`. The duration timer is exported as a histogram together with
//! rolling-window percentile gauges.

use std::time::Duration;

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::debug;

use super::quantiles::RollingQuantiles;
use crate::domain::ports::{
    MetricSink, Outcome, DEFAULT_PERCENTILES, OPERATIONS_TOTAL, OPERATION_DURATION_SECONDS,
};
use crate::error::{Error, MetricSinkError, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Prometheus metric sink
#[derive(Debug, Clone)]
pub struct MetricSinkConfig {
    /// Percentiles published for the duration timer
    pub percentiles: Vec<f64>,

    /// Trailing window the percentiles are computed over
    pub percentile_window: Duration,

    /// Upper bound on samples retained in the window
    pub max_window_samples: usize,

    /// Histogram bucket boundaries in seconds
    pub buckets: Vec<f64>,
}

impl Default for MetricSinkConfig {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            percentile_window: Duration::from_secs(120),
            max_window_samples: 4096,
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        }
    }
}

// =============================================================================
// Prometheus Metric Sink
// =============================================================================

/// Metric sink backed by a private Prometheus registry
pub struct PrometheusMetricSink {
    registry: Registry,
    operations: IntCounter,
    duration: Histogram,
    outcomes: IntCounterVec,
    percentile_gauges: GaugeVec,
    percentiles: Vec<f64>,
    window: RollingQuantiles,
}

impl PrometheusMetricSink {
    /// Register the probe metrics with a fresh registry
    pub fn new(config: MetricSinkConfig) -> Result<Self> {
        if let Some(bad) = config
            .percentiles
            .iter()
            .find(|p| !(p.is_finite() && **p > 0.0 && **p < 1.0))
        {
            return Err(Error::Config(format!(
                "percentile {} must lie strictly between 0 and 1",
                bad
            )));
        }

        let registry = Registry::new();

        let operations = IntCounter::new(OPERATIONS_TOTAL, "Total number of MongoDB operations")?;

        let duration = Histogram::with_opts(
            HistogramOpts::new(
                OPERATION_DURATION_SECONDS,
                "MongoDB operation latency in seconds",
            )
            .buckets(config.buckets.clone()),
        )?;

        let outcomes = IntCounterVec::new(
            Opts::new(
                "mongodb_operation_outcomes_total",
                "Probe cycles by outcome",
            ),
            &["outcome"],
        )?;

        let percentile_gauges = GaugeVec::new(
            Opts::new(
                format!("{}_percentile", OPERATION_DURATION_SECONDS),
                "MongoDB operation latency percentiles over the rolling window",
            ),
            &["quantile"],
        )?;

        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(outcomes.clone()))?;
        registry.register(Box::new(percentile_gauges.clone()))?;

        Ok(Self {
            registry,
            operations,
            duration,
            outcomes,
            percentile_gauges,
            percentiles: config.percentiles,
            window: RollingQuantiles::new(config.percentile_window, config.max_window_samples),
        })
    }

    /// Sink with the default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(MetricSinkConfig::default())
    }

    /// The registry backing this sink
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current value of the operations counter
    pub fn operations_total(&self) -> u64 {
        self.operations.get()
    }

    /// Number of duration samples recorded since start
    pub fn duration_sample_count(&self) -> u64 {
        self.duration.get_sample_count()
    }

    /// Sum of all recorded durations in seconds
    pub fn duration_sample_sum(&self) -> f64 {
        self.duration.get_sample_sum()
    }

    /// Number of samples recorded with the given outcome
    pub fn outcome_count(&self, outcome: Outcome) -> u64 {
        self.outcomes.with_label_values(&[outcome.as_str()]).get()
    }

    /// Percentile over the rolling window, if any samples remain in it
    pub fn percentile(&self, q: f64) -> Option<f64> {
        self.window.quantile(q)
    }

    /// Render the registry in Prometheus text exposition format
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.refresh_percentiles();

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    fn refresh_percentiles(&self) {
        let values = self
            .window
            .quantiles_at(tokio::time::Instant::now(), &self.percentiles);

        for (q, value) in self.percentiles.iter().zip(values) {
            let label = q.to_string();
            self.percentile_gauges
                .with_label_values(&[label.as_str()])
                .set(value.unwrap_or(0.0));
        }
    }
}

impl std::fmt::Debug for PrometheusMetricSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetricSink")
            .field("percentiles", &self.percentiles)
            .field("window_samples", &self.window.len())
            .finish()
    }
}

impl MetricSink for PrometheusMetricSink {
    fn increment_counter(&self, name: &str) -> std::result::Result<(), MetricSinkError> {
        if name != OPERATIONS_TOTAL {
            return Err(MetricSinkError::UnknownMetric(name.to_string()));
        }
        self.operations.inc();
        Ok(())
    }

    fn record_timer(
        &self,
        name: &str,
        duration: Duration,
        outcome: Outcome,
    ) -> std::result::Result<(), MetricSinkError> {
        if name != OPERATION_DURATION_SECONDS {
            return Err(MetricSinkError::UnknownMetric(name.to_string()));
        }

        let secs = duration.as_secs_f64();
        self.duration.observe(secs);
        self.outcomes.with_label_values(&[outcome.as_str()]).inc();
        self.window.record(secs);
        self.refresh_percentiles();

        debug!(duration_secs = secs, outcome = %outcome, "Recorded probe duration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_sink_creation() {
        let sink = PrometheusMetricSink::with_defaults().unwrap();
        assert_eq!(sink.operations_total(), 0);
        assert_eq!(sink.duration_sample_count(), 0);
        assert!(format!("{:?}", sink).contains("PrometheusMetricSink"));
    }

    #[test]
    fn test_invalid_percentile_rejected() {
        let config = MetricSinkConfig {
            percentiles: vec![0.95, 1.5],
            ..Default::default()
        };
        let result = PrometheusMetricSink::new(config);
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_counter_increment() {
        let sink = PrometheusMetricSink::with_defaults().unwrap();
        sink.increment_counter(OPERATIONS_TOTAL).unwrap();
        sink.increment_counter(OPERATIONS_TOTAL).unwrap();
        assert_eq!(sink.operations_total(), 2);
    }

    #[test]
    fn test_unknown_metric_names() {
        let sink = PrometheusMetricSink::with_defaults().unwrap();
        assert_matches!(
            sink.increment_counter("nope_total"),
            Err(MetricSinkError::UnknownMetric(name)) if name == "nope_total"
        );
        assert_matches!(
            sink.record_timer(OPERATIONS_TOTAL, Duration::from_millis(1), Outcome::Success),
            Err(MetricSinkError::UnknownMetric(_))
        );
        assert_eq!(sink.operations_total(), 0);
        assert_eq!(sink.duration_sample_count(), 0);
    }

    #[test]
    fn test_timer_records_samples_and_outcomes() {
        let sink = PrometheusMetricSink::with_defaults().unwrap();
        sink.record_timer(
            OPERATION_DURATION_SECONDS,
            Duration::from_millis(10),
            Outcome::Success,
        )
        .unwrap();
        sink.record_timer(
            OPERATION_DURATION_SECONDS,
            Duration::from_millis(30),
            Outcome::Failure,
        )
        .unwrap();

        assert_eq!(sink.duration_sample_count(), 2);
        assert!((sink.duration_sample_sum() - 0.040).abs() < 1e-9);
        assert_eq!(sink.outcome_count(Outcome::Success), 1);
        assert_eq!(sink.outcome_count(Outcome::Failure), 1);
        assert_eq!(sink.percentile(0.99), Some(0.030));
    }

    #[test]
    fn test_encode_exposition() {
        let sink = PrometheusMetricSink::with_defaults().unwrap();
        sink.increment_counter(OPERATIONS_TOTAL).unwrap();
        sink.record_timer(
            OPERATION_DURATION_SECONDS,
            Duration::from_millis(20),
            Outcome::Success,
        )
        .unwrap();

        let text = String::from_utf8(sink.encode().unwrap()).unwrap();
        assert!(text.contains("mongodb_operations_total 1"));
        assert!(text.contains("mongodb_operation_duration_seconds_count 1"));
        assert!(text.contains("mongodb_operation_duration_seconds_bucket"));
        assert!(text.contains(r#"mongodb_operation_duration_seconds_percentile{quantile="0.95"} 0.02"#));
        assert!(text.contains(r#"mongodb_operation_duration_seconds_percentile{quantile="0.99"} 0.02"#));
    }
}
