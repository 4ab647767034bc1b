//! Runtime configuration
//!
//! Settings are fixed at process start. The CLI in `main.rs` fills a
//! [`ProbeSettings`], which is validated once and then split into the
//! per-component configs.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metrics::MetricSinkConfig;
use crate::probe::ProbeConfig;
use crate::scheduler::SchedulerConfig;

/// Which store adapter the probe talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    /// MongoDB via the official driver
    Mongo,
    /// Process-local in-memory store
    Memory,
}

/// Fully resolved probe settings
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub period: Duration,
    pub store_timeout: Duration,
    pub store: StoreBackend,
    pub mongo_uri: String,
    pub database: String,
    pub collection: String,
    pub source: String,
    pub message: String,
    pub percentiles: Vec<f64>,
    pub percentile_window: Duration,
    pub failure_threshold: u64,
    pub metrics_addr: SocketAddr,
    pub health_addr: SocketAddr,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            store_timeout: Duration::from_secs(3),
            store: StoreBackend::Mongo,
            mongo_uri: "mongodb://mongo:27017".to_string(),
            database: "monitoring".to_string(),
            collection: "events".to_string(),
            source: "mongo-probe".to_string(),
            message: "Periodic event".to_string(),
            percentiles: vec![0.95, 0.99],
            percentile_window: Duration::from_secs(120),
            failure_threshold: 3,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl ProbeSettings {
    /// Reject settings the scheduler or probe cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(Error::Config("period must be non-zero".into()));
        }
        if self.store_timeout.is_zero() {
            return Err(Error::Config("store timeout must be non-zero".into()));
        }
        if self.store_timeout >= self.period {
            return Err(Error::Config(format!(
                "store timeout ({:?}) must be shorter than the period ({:?})",
                self.store_timeout, self.period
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Config("collection name must not be empty".into()));
        }
        if self.percentiles.is_empty() {
            return Err(Error::Config("at least one percentile is required".into()));
        }
        if self.metrics_addr == self.health_addr {
            return Err(Error::Config(format!(
                "metrics and health servers cannot share {}",
                self.metrics_addr
            )));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            period: self.period,
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            collection: self.collection.clone(),
            source: self.source.clone(),
            message: self.message.clone(),
            store_timeout: self.store_timeout,
        }
    }

    pub fn sink_config(&self) -> MetricSinkConfig {
        MetricSinkConfig {
            percentiles: self.percentiles.clone(),
            percentile_window: self.percentile_window,
            ..Default::default()
        }
    }
}

/// Parse a duration such as `5s`, `250ms`, `1m30s` or `2h`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_ms: u64 = 0;
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut num_buf = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            num_buf.push(c);
            chars.next();
        }
        let num: u64 = num_buf
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;

        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_alphabetic) {
            unit.push(c);
            chars.next();
        }

        let multiplier_ms = match unit.to_ascii_lowercase().as_str() {
            "ms" => 1,
            "" | "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            other => {
                return Err(Error::DurationParse(format!(
                    "unknown duration unit '{}' in {}",
                    other, s
                )))
            }
        };

        total_ms = num
            .checked_mul(multiplier_ms)
            .and_then(|v| total_ms.checked_add(v))
            .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
    }

    Ok(Duration::from_millis(total_ms))
}

/// Parse a comma-separated percentile list such as `0.95,0.99`
pub fn parse_percentiles(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let value: f64 = p
                .parse()
                .map_err(|_| Error::Config(format!("invalid percentile: {}", p)))?;
            if value > 0.0 && value < 1.0 {
                Ok(value)
            } else {
                Err(Error::Config(format!(
                    "percentile {} must lie strictly between 0 and 1",
                    value
                )))
            }
        })
        .collect()
}
