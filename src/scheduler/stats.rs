//! Scheduler statistics shared with the health endpoints

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Running totals kept by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    /// Whether the scheduler loop is currently running
    pub running: bool,
    /// Runs started
    pub cycles: u64,
    /// Runs that returned `Ok`
    pub successes: u64,
    /// Runs that failed or panicked
    pub failures: u64,
    /// Failures since the last success
    pub consecutive_failures: u64,
    /// Grid slots dropped because a run overran its period
    pub skipped_ticks: u64,
    /// Duration of the most recent run in milliseconds
    pub last_duration_ms: u64,
    /// When the most recent successful run finished
    pub last_success_at: Option<DateTime<Utc>>,
    /// When the most recent failed run finished
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl SchedulerStats {
    pub(crate) fn record_success(&mut self, duration_ms: u64) {
        self.successes += 1;
        self.consecutive_failures = 0;
        self.last_duration_ms = duration_ms;
        self.last_success_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&mut self, duration_ms: u64, error: String) {
        self.failures += 1;
        self.consecutive_failures += 1;
        self.last_duration_ms = duration_ms;
        self.last_failure_at = Some(Utc::now());
        self.last_error = Some(error);
    }
}

/// Cloneable handle onto the live statistics
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Arc<RwLock<SchedulerStats>>);

impl StatsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current statistics
    pub fn snapshot(&self) -> SchedulerStats {
        self.0.read().clone()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SchedulerStats) -> R) -> R {
        f(&mut self.0.write())
    }
}
