//! Metrics module
//!
//! Metric sinks implementing the `MetricSink` port, the rolling percentile
//! window behind the latency timer, and the scoped timer guard.

mod quantiles;
mod recording;
mod sink;
mod timer;

pub use quantiles::RollingQuantiles;
pub use recording::RecordingMetricSink;
pub use sink::{MetricSinkConfig, PrometheusMetricSink};
pub use timer::TimerGuard;
