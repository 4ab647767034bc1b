//! Error types for the document store probe

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the probe service itself (bootstrap and scheduler boundary)
#[derive(Error, Debug)]
pub enum Error {
    /// A document store call failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Metric registration or recording failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricSinkError),

    /// Prometheus registry error
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// A scheduled task panicked
    #[error("Task '{task}' panicked: {message}")]
    TaskPanicked { task: String, message: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable tag used as the `error.kind` log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Store(e) => e.kind(),
            Error::Metrics(_) => "metrics",
            Error::Prometheus(_) => "prometheus",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::DurationParse(_) => "duration_parse",
            Error::TaskPanicked { .. } => "panic",
            Error::Internal(_) => "internal",
        }
    }

    /// Connection loss or timeout reported by the store
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_transient())
    }
}

// =============================================================================
// Store Errors
// =============================================================================

/// Failure of a count or insert call against the document store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The call did not complete within its deadline
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The write was rejected (conflict, duplicate key, write concern)
    #[error("write rejected: {0}")]
    Write(String),

    /// The request or document failed validation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Anything the driver reports that does not fit the above
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Short, stable tag used as the `error.kind` log field
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "connection",
            StoreError::Timeout { .. } => "timeout",
            StoreError::Write(_) => "write",
            StoreError::Validation(_) => "validation",
            StoreError::Other(_) => "store",
        }
    }

    /// Whether the next tick has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout { .. })
    }
}

// =============================================================================
// Metric Sink Errors
// =============================================================================

/// Failure to record into the metrics backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricSinkError {
    /// The metric name was never registered with the sink
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// The backend refused the update
    #[error("metrics backend unavailable: {0}")]
    Backend(String),
}
