//! In-Memory Store Adapter
//!
//! Implements the `StoreClient` port with per-collection vectors. Supports
//! injected faults and artificial latency so the probe's failure paths can be
//! exercised without a database.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::ports::{ProbeEvent, RecordId, StoreClient};
use crate::error::StoreError;

#[derive(Debug, Default, Clone)]
struct Faults {
    count: Option<StoreError>,
    insert: Option<StoreError>,
    count_latency: Duration,
    insert_latency: Duration,
}

/// Document store held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: DashMap<String, Vec<(RecordId, ProbeEvent)>>,
    faults: RwLock<Faults>,
    count_calls: AtomicU64,
    insert_calls: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `count` call fail with `error`
    pub fn fail_count_with(&self, error: StoreError) {
        self.faults.write().count = Some(error);
    }

    /// Make every `insert` call fail with `error`
    pub fn fail_insert_with(&self, error: StoreError) {
        self.faults.write().insert = Some(error);
    }

    /// Delay every `count` call by `latency`
    pub fn set_count_latency(&self, latency: Duration) {
        self.faults.write().count_latency = latency;
    }

    /// Delay every `insert` call by `latency`
    pub fn set_insert_latency(&self, latency: Duration) {
        self.faults.write().insert_latency = latency;
    }

    /// Remove injected failures and latency
    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    /// Records stored in a collection, in insertion order
    pub fn records(&self, collection: &str) -> Vec<(RecordId, ProbeEvent)> {
        self.collections
            .get(collection)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// Number of records stored in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |r| r.len())
    }

    /// Whether a collection holds no records
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of `count` calls received, failed ones included
    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(Ordering::Relaxed)
    }

    /// Number of `insert` calls received, failed ones included
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.count_calls.fetch_add(1, Ordering::Relaxed);

        let (latency, fault) = {
            let faults = self.faults.read();
            (faults.count_latency, faults.count.clone())
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = fault {
            return Err(err);
        }

        Ok(self.len(collection) as u64)
    }

    async fn insert(&self, collection: &str, record: ProbeEvent) -> Result<RecordId, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);

        let (latency, fault) = {
            let faults = self.faults.read();
            (faults.insert_latency, faults.insert.clone())
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = fault {
            return Err(err);
        }

        let id = RecordId::new(uuid::Uuid::new_v4().to_string());
        debug!(collection, record_id = %id, "Stored record in memory");
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), record));
        Ok(id)
    }
}
