//! Document Store Probe
//!
//! Periodically counts a collection and inserts a probe event into a document
//! store, recording the outcome as Prometheus metrics. Failures are logged and
//! never stop the schedule.
//!
//! # Architecture
//!
//! ```text
//! Task Scheduler ──tick──▶ Probe Operation ──count/insert──▶ Store Client
//!        │                        │
//!        │ logs outcome           └──counter/timer──▶ Metric Sink ──▶ /metrics
//!        └──stats──▶ Health Monitor ──▶ /readyz
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Store client implementations (MongoDB, in-memory)
//! - [`config`] - Settings, validation and duration parsing
//! - [`domain`] - Value objects and ports
//! - [`error`] - Error types
//! - [`health`] - Liveness and readiness
//! - [`metrics`] - Metric sinks, percentile window and timer guard
//! - [`probe`] - The instrumented count + insert cycle
//! - [`scheduler`] - Fixed-rate task scheduler
//! - [`server`] - HTTP endpoints

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod metrics;
pub mod probe;
pub mod scheduler;
pub mod server;

// Re-export commonly used types
pub use domain::{MetricSink, ProbeEvent, StoreClient};
pub use error::{Error, Result, StoreError};
pub use probe::{ProbeConfig, ProbeOperation};
pub use scheduler::{ScheduledTask, SchedulerConfig, TaskScheduler};
