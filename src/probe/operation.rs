//! Probe Operation
//!
//! One probe cycle: count the target collection, then insert a fresh
//! `ProbeEvent`. Each successful sub-operation bumps the operations counter;
//! the whole cycle is timed by a single `TimerGuard` sample.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::domain::ports::{
    MetricSink, ProbeEvent, StoreClient, OPERATIONS_TOTAL, OPERATION_DURATION_SECONDS,
};
use crate::error::{Result, StoreError};
use crate::metrics::TimerGuard;
use crate::scheduler::ScheduledTask;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the probe operation
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Collection that is counted and written to
    pub collection: String,

    /// Origin tag written into every event
    pub source: String,

    /// Message written into every event
    pub message: String,

    /// Deadline for each individual store call
    pub store_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            collection: "events".to_string(),
            source: "mongo-probe".to_string(),
            message: "Periodic event".to_string(),
            store_timeout: Duration::from_secs(3),
        }
    }
}

// =============================================================================
// Probe Operation
// =============================================================================

/// The unit of work fired on every tick
pub struct ProbeOperation {
    config: ProbeConfig,
    store: Arc<dyn StoreClient>,
    metrics: Arc<dyn MetricSink>,
}

impl ProbeOperation {
    /// Create a probe over the given store and metric sink
    pub fn new(
        config: ProbeConfig,
        store: Arc<dyn StoreClient>,
        metrics: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            config,
            store,
            metrics,
        }
    }

    /// Run one count + insert cycle.
    ///
    /// The first failing store call aborts the cycle. Exactly one duration
    /// sample is recorded whatever the outcome.
    #[instrument(skip(self), fields(collection = %self.config.collection))]
    pub async fn execute(&self) -> std::result::Result<(), StoreError> {
        let mut timer = TimerGuard::start(self.metrics.as_ref(), OPERATION_DURATION_SECONDS);

        let count = self
            .bounded("count", self.store.count(&self.config.collection))
            .await?;
        self.record_operation();
        debug!(count, "Counted documents");

        let event = ProbeEvent::new(self.config.source.as_str(), self.config.message.as_str());
        let record_id = self
            .bounded("insert", self.store.insert(&self.config.collection, event))
            .await?;
        self.record_operation();
        debug!(record_id = %record_id, "Inserted probe event");

        timer.succeed();
        debug!(
            elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Probe cycle succeeded"
        );
        Ok(())
    }

    /// Apply the per-call deadline to a store call
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> std::result::Result<T, StoreError>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let timeout = self.config.store_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { operation, timeout }),
        }
    }

    fn record_operation(&self) {
        if let Err(e) = self.metrics.increment_counter(OPERATIONS_TOTAL) {
            warn!(metric = OPERATIONS_TOTAL, error = %e, "Failed to increment counter");
        }
    }
}

impl std::fmt::Debug for ProbeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeOperation")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl ScheduledTask for ProbeOperation {
    fn name(&self) -> &str {
        "mongodb-probe"
    }

    async fn run_once(&self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
