//! Scheduler module
//!
//! A single local timer that fires a [`ScheduledTask`] at a fixed rate.
//!
//! Tick `k` is due at `start + k * period`. A run that overruns the next due
//! instant is followed immediately by the next run; the slots it covered are
//! dropped and later runs land back on the grid.
//!
//! No cross-process coordination: each process runs its own schedule and
//! forgets it on exit.

mod runner;
mod state;
mod stats;

pub use runner::{ScheduledTask, SchedulerConfig, TaskScheduler};
pub use state::{Advance, ScheduleState};
pub use stats::{SchedulerStats, StatsHandle};
