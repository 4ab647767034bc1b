//! Health Checks
//!
//! Liveness and readiness derived from the scheduler's running totals.
//! Readiness degrades as consecutive probe failures accumulate and turns
//! unhealthy at the configured threshold.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::scheduler::{SchedulerStats, StatsHandle};

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Probe is succeeding
    Healthy,
    /// Recent probe cycles failed, below the threshold
    Degraded,
    /// Probe failing persistently, or not started
    Unhealthy,
}

impl HealthStatus {
    /// Healthy or degraded
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    fn severity(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "Healthy"),
            HealthStatus::Degraded => write!(f, "Degraded"),
            HealthStatus::Unhealthy => write!(f, "Unhealthy"),
        }
    }
}

/// Result of one named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl HealthCheckResult {
    fn new(name: &str, status: HealthStatus, message: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

/// Overall health response served on `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Worst status across all checks
    pub status: HealthStatus,
    pub checks: Vec<HealthCheckResult>,
    pub probe: SchedulerStats,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Derives health from scheduler statistics
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    start_time: Instant,
    stats: StatsHandle,
    failure_threshold: u64,
}

impl HealthMonitor {
    /// `failure_threshold` consecutive failures make readiness unhealthy
    pub fn new(stats: StatsHandle, failure_threshold: u64) -> Self {
        Self {
            start_time: Instant::now(),
            stats,
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Healthy unless the scheduler loop has stopped after starting
    pub fn liveness_check(&self) -> HealthCheckResult {
        let stats = self.stats.snapshot();
        if stats.cycles > 0 && !stats.running {
            HealthCheckResult::new(
                "liveness",
                HealthStatus::Unhealthy,
                Some("scheduler stopped".to_string()),
            )
        } else {
            HealthCheckResult::new("liveness", HealthStatus::Healthy, None)
        }
    }

    /// Based on the outcome of recent probe cycles
    pub fn readiness_check(&self) -> HealthCheckResult {
        let stats = self.stats.snapshot();
        self.readiness_from(&stats)
    }

    fn readiness_from(&self, stats: &SchedulerStats) -> HealthCheckResult {
        let (status, message) = if stats.successes + stats.failures == 0 {
            (
                HealthStatus::Unhealthy,
                Some("no probe cycle completed yet".to_string()),
            )
        } else if stats.consecutive_failures == 0 {
            (HealthStatus::Healthy, None)
        } else {
            let status = if stats.consecutive_failures >= self.failure_threshold {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::Degraded
            };
            let message = format!(
                "{} consecutive failures: {}",
                stats.consecutive_failures,
                stats.last_error.as_deref().unwrap_or("unknown error")
            );
            (status, Some(message))
        };

        HealthCheckResult::new("readiness", status, message)
    }

    /// Run all checks
    pub fn check_all(&self) -> HealthResponse {
        let stats = self.stats.snapshot();
        let checks = vec![self.liveness_check(), self.readiness_from(&stats)];
        let status = checks
            .iter()
            .map(|c| c.status)
            .max_by_key(HealthStatus::severity)
            .unwrap_or(HealthStatus::Healthy);

        HealthResponse {
            status,
            checks,
            probe: stats,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime().as_secs(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
