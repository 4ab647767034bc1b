//! Scoped timer sample
//!
//! A `TimerGuard` starts measuring when created and records exactly one
//! sample into its sink when dropped, on every exit path.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::domain::ports::{MetricSink, Outcome};

/// Records the elapsed time into `name` on drop.
///
/// The sample is tagged `Failure` unless [`TimerGuard::succeed`] was called.
#[must_use = "the sample is recorded when the guard is dropped"]
pub struct TimerGuard<'a> {
    sink: &'a dyn MetricSink,
    name: &'static str,
    started: Instant,
    outcome: Outcome,
}

impl<'a> TimerGuard<'a> {
    /// Start measuring
    pub fn start(sink: &'a dyn MetricSink, name: &'static str) -> Self {
        Self {
            sink,
            name,
            started: Instant::now(),
            outcome: Outcome::Failure,
        }
    }

    /// Tag the pending sample as a success
    pub fn succeed(&mut self) {
        self.outcome = Outcome::Success;
    }

    /// Time elapsed since the guard was started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        if let Err(e) = self.sink.record_timer(self.name, elapsed, self.outcome) {
            warn!(metric = self.name, error = %e, "Failed to record timer sample");
        }
    }
}
