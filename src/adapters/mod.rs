//! Infrastructure Adapters
//!
//! Adapter implementations for the `StoreClient` port, following the
//! Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │              StoreClient  │  MetricSink                    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │        MongoStore (feature "mongo")  │  InMemoryStore      │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Metric sink implementations live in [`crate::metrics`].

mod memory;
#[cfg(feature = "mongo")]
mod mongo;

pub use memory::InMemoryStore;
#[cfg(feature = "mongo")]
pub use mongo::{MongoConfig, MongoStore};
