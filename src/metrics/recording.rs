//! In-memory metric sink.
//!
//! Collects counter increments and timer samples for later inspection.
//! Used by tests and by embedders that want to inspect what the probe recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::domain::ports::{MetricSink, Outcome};
use crate::error::MetricSinkError;

/// Metric sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct RecordingMetricSink {
    counters: RwLock<HashMap<String, u64>>,
    timers: RwLock<HashMap<String, Vec<(Duration, Outcome)>>>,
    failing: AtomicBool,
}

impl RecordingMetricSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a backend error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Current value of a counter (zero if never incremented)
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    /// Samples recorded into a timer, oldest first
    pub fn timer_samples(&self, name: &str) -> Vec<(Duration, Outcome)> {
        self.timers.read().get(name).cloned().unwrap_or_default()
    }

    /// Number of samples recorded into a timer
    pub fn timer_count(&self, name: &str) -> usize {
        self.timers.read().get(name).map_or(0, Vec::len)
    }

    fn check_backend(&self) -> Result<(), MetricSinkError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(MetricSinkError::Backend("recording sink set to fail".into()));
        }
        Ok(())
    }
}

impl MetricSink for RecordingMetricSink {
    fn increment_counter(&self, name: &str) -> Result<(), MetricSinkError> {
        self.check_backend()?;
        *self.counters.write().entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn record_timer(
        &self,
        name: &str,
        duration: Duration,
        outcome: Outcome,
    ) -> Result<(), MetricSinkError> {
        self.check_backend()?;
        self.timers
            .write()
            .entry(name.to_string())
            .or_default()
            .push((duration, outcome));
        Ok(())
    }
}
