//! Domain Layer
//!
//! Value objects and the ports (traits) the probe is written against.
//!
//! # Usage
//!
//! ```ignore
//! use mongo_probe::domain::{MetricSink, StoreClient, OPERATIONS_TOTAL};
//!
//! async fn touch(store: &dyn StoreClient, sink: &dyn MetricSink) -> Result<(), StoreError> {
//!     store.count("events").await?;
//!     let _ = sink.increment_counter(OPERATIONS_TOTAL);
//!     Ok(())
//! }
//! ```

pub mod ports;

pub use ports::{
    MetricSink, Outcome, ProbeEvent, RecordId, StoreClient, DEFAULT_PERCENTILES,
    OPERATIONS_TOTAL, OPERATION_DURATION_SECONDS,
};
