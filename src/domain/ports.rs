//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! This module defines the abstractions the probe depends on. Infrastructure
//! adapters implement these traits; the probe and scheduler only ever see the
//! traits, injected as `Arc<dyn ...>` handles.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          StoreClient     │     MetricSink            │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  MongoStore │ InMemoryStore │ PrometheusMetricSink  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetricSinkError, StoreError};

// =============================================================================
// Metric Names
// =============================================================================

/// Counter incremented once per successful store sub-operation.
pub const OPERATIONS_TOTAL: &str = "mongodb_operations_total";

/// Timer recording the duration of each probe cycle.
pub const OPERATION_DURATION_SECONDS: &str = "mongodb_operation_duration_seconds";

/// Percentiles published for the duration timer unless configured otherwise.
pub const DEFAULT_PERCENTILES: [f64; 2] = [0.95, 0.99];

// =============================================================================
// Value Objects
// =============================================================================

/// One unit of recorded probe work, written to the store on every cycle.
///
/// Built immediately before insertion and moved into the store client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEvent {
    /// Creation instant
    pub timestamp: DateTime<Utc>,
    /// Origin tag of the probe instance
    pub source: String,
    /// Human-readable description
    pub message: String,
}

impl ProbeEvent {
    /// Create an event stamped with the current time.
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Identifier the store assigned to an inserted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome tag attached to a timer sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Prometheus label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Store Port
// =============================================================================

/// Port for the document store the probe exercises.
///
/// Implementations own connection handling; callers bound each call with
/// their own deadline.
///
/// # Example
///
/// ```ignore
/// let store: Arc<dyn StoreClient> = Arc::new(InMemoryStore::new());
/// let n = store.count("events").await?;
/// let id = store.insert("events", ProbeEvent::new("probe", "hello")).await?;
/// ```
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Count the documents in a collection.
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Insert a record, taking ownership of it.
    async fn insert(&self, collection: &str, record: ProbeEvent) -> Result<RecordId, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// Metrics Port
// =============================================================================

/// Port for the metrics backend.
///
/// Pass-through wrapper over counter and timer primitives. Callers treat
/// every error as best-effort and never propagate it.
pub trait MetricSink: Send + Sync {
    /// Increment a monotonically increasing counter by one.
    fn increment_counter(&self, name: &str) -> Result<(), MetricSinkError>;

    /// Record one duration sample into a timer.
    fn record_timer(
        &self,
        name: &str,
        duration: Duration,
        outcome: Outcome,
    ) -> Result<(), MetricSinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_event_new() {
        let before = Utc::now();
        let event = ProbeEvent::new("probe-a", "Periodic event");
        assert_eq!(event.source, "probe-a");
        assert_eq!(event.message, "Periodic event");
        assert!(event.timestamp >= before);
    }

    #[test]
    fn test_probe_event_serialization() {
        let event = ProbeEvent::new("probe-a", "Periodic event");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "probe-a");
        assert_eq!(json["message"], "Periodic event");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::new("65f0c0ffee");
        assert_eq!(id.to_string(), "65f0c0ffee");
        assert_eq!(id.as_str(), "65f0c0ffee");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::Failure.to_string(), "failure");
    }
}
