//! Probe module
//!
//! The instrumented count + insert cycle run on every scheduler tick.

mod operation;

pub use operation::{ProbeConfig, ProbeOperation};
