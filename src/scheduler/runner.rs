//! Task Scheduler
//!
//! Fires a task at a fixed rate, one run at a time, and keeps every failure
//! (error or panic) inside the loop so the process keeps running.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::state::ScheduleState;
use super::stats::{SchedulerStats, StatsHandle};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the task scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed-rate period between due ticks
    pub period: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Scheduled Task
// =============================================================================

/// Unit of work the scheduler fires on every tick
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run the task once
    async fn run_once(&self) -> Result<()>;
}

// =============================================================================
// Task Scheduler
// =============================================================================

/// Fixed-rate, strictly sequential task runner
#[derive(Debug)]
pub struct TaskScheduler {
    config: SchedulerConfig,
    stats: StatsHandle,
    active: AtomicBool,
}

impl TaskScheduler {
    /// Create a scheduler; the period must be non-zero
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.period.is_zero() {
            return Err(Error::Config("scheduler period must be non-zero".into()));
        }
        Ok(Self {
            config,
            stats: StatsHandle::new(),
            active: AtomicBool::new(false),
        })
    }

    /// Configured period
    pub fn period(&self) -> Duration {
        self.config.period
    }

    /// Handle onto the live statistics
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// Fire `task` every period until `shutdown` is cancelled.
    ///
    /// The first run starts immediately. An in-flight run always completes
    /// before this returns. Only one `run` may be active per scheduler; the
    /// cycle counter carries over from earlier runs.
    #[instrument(skip_all, fields(task = %task.name(), period_ms = self.config.period.as_millis() as u64))]
    pub async fn run<T>(&self, task: &T, shutdown: CancellationToken) -> Result<SchedulerStats>
    where
        T: ScheduledTask + ?Sized,
    {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(Error::Internal(format!(
                "scheduler for '{}' is already running",
                task.name()
            )));
        }
        let _active = ActiveGuard(&self.active);

        let resumed = self.stats.snapshot().cycles;
        let mut state = ScheduleState::resume(Instant::now(), self.config.period, resumed);
        self.stats.update(|s| s.running = true);
        info!(resumed, "Starting scheduler");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep_until(state.next_fire()) => {}
            }

            let cycle = state.begin();
            self.stats.update(|s| s.cycles = cycle);

            let started = Instant::now();
            let result = match AssertUnwindSafe(task.run_once()).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(Error::TaskPanicked {
                    task: task.name().to_string(),
                    message: panic_message(panic.as_ref()),
                }),
            };
            let elapsed = started.elapsed();
            let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

            match result {
                Ok(()) => {
                    info!(cycle, duration_ms, "Periodic operations completed");
                    self.stats.update(|s| s.record_success(duration_ms));
                }
                Err(e) => {
                    error!(
                        cycle,
                        duration_ms,
                        error.kind = e.kind(),
                        error.transient = e.is_transient(),
                        error.message = %e,
                        "Periodic operations failed"
                    );
                    self.stats
                        .update(|s| s.record_failure(duration_ms, e.to_string()));
                }
            }

            let advance = state.complete(Instant::now());
            if advance.immediate {
                warn!(
                    cycle,
                    duration_ms,
                    skipped = advance.skipped,
                    "Run overran its period; next run starts immediately"
                );
                self.stats.update(|s| s.skipped_ticks += advance.skipped);
            }
        }

        let stats = self.stats.update(|s| {
            s.running = false;
            s.clone()
        });
        info!(cycles = stats.cycles, "Scheduler stopped");
        Ok(stats)
    }
}

/// Clears the active flag when `run` exits
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    /// Records start/end instants of each run; optional per-run behavior
    #[derive(Default)]
    struct ScriptedTask {
        runs: Mutex<Vec<(Instant, Instant)>>,
        durations: Mutex<Vec<Duration>>,
        fail: AtomicBool,
        panic_on: Option<u64>,
        calls: AtomicU64,
        in_flight: AtomicBool,
        overlapped: AtomicBool,
    }

    impl ScriptedTask {
        fn with_durations(durations: Vec<Duration>) -> Self {
            Self {
                durations: Mutex::new(durations),
                ..Default::default()
            }
        }

        fn starts(&self) -> Vec<Instant> {
            self.runs.lock().iter().map(|(s, _)| *s).collect()
        }
    }

    #[async_trait]
    impl ScheduledTask for ScriptedTask {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run_once(&self) -> Result<()> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let start = Instant::now();

            let duration = {
                let mut durations = self.durations.lock();
                if durations.is_empty() {
                    Duration::ZERO
                } else {
                    durations.remove(0)
                }
            };
            if !duration.is_zero() {
                tokio::time::sleep(duration).await;
            }

            self.runs.lock().push((start, Instant::now()));
            self.in_flight.store(false, Ordering::SeqCst);

            if self.panic_on == Some(call) {
                panic!("scripted panic on call {}", call);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Timeout {
                    operation: "count",
                    timeout: Duration::from_secs(3),
                }
                .into());
            }
            Ok(())
        }
    }

    fn scheduler(period: Duration) -> TaskScheduler {
        TaskScheduler::new(SchedulerConfig { period }).unwrap()
    }

    /// Let the scheduler run until `task` has been called `n` times, then stop it.
    async fn run_for_calls(
        scheduler: &TaskScheduler,
        task: Arc<ScriptedTask>,
        n: u64,
    ) -> SchedulerStats {
        let token = CancellationToken::new();
        let stopper = {
            let token = token.clone();
            let task = task.clone();
            tokio::spawn(async move {
                while task.calls.load(Ordering::SeqCst) < n {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                token.cancel();
            })
        };
        let stats = scheduler.run(task.as_ref(), token).await.unwrap();
        stopper.await.unwrap();
        stats
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = TaskScheduler::new(SchedulerConfig {
            period: Duration::ZERO,
        });
        assert_matches!(result, Err(Error::Config(_)));
    }

    #[test]
    fn test_default_period() {
        assert_eq!(SchedulerConfig::default().period, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_is_immediate_and_fixed_rate() {
        let scheduler = scheduler(Duration::from_secs(5));
        let task = Arc::new(ScriptedTask::with_durations(vec![
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(10),
        ]));
        let t0 = Instant::now();

        let stats = run_for_calls(&scheduler, task.clone(), 3).await;

        let starts = task.starts();
        assert_eq!(starts.len(), 3);
        assert!(starts[0].duration_since(t0) < Duration::from_millis(2));
        for (k, start) in starts.iter().enumerate() {
            let offset = start.duration_since(starts[0]);
            let expected = Duration::from_secs(5) * k as u32;
            assert!(offset >= expected && offset < expected + Duration::from_millis(2));
        }
        assert_eq!(stats.cycles, 3);
        assert_eq!(stats.successes, 3);
        assert!(!stats.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_never_stop_the_loop() {
        let scheduler = scheduler(Duration::from_millis(100));
        let task = Arc::new(ScriptedTask::default());
        task.fail.store(true, Ordering::SeqCst);

        let stats = run_for_calls(&scheduler, task.clone(), 5).await;

        assert!(stats.cycles >= 5);
        assert_eq!(stats.successes, 0);
        assert_eq!(stats.failures, stats.cycles);
        assert_eq!(stats.consecutive_failures, stats.cycles);
        assert!(stats.last_error.unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panics_are_isolated() {
        let scheduler = scheduler(Duration::from_millis(100));
        let task = Arc::new(ScriptedTask {
            panic_on: Some(2),
            ..Default::default()
        });

        let stats = run_for_calls(&scheduler, task.clone(), 4).await;

        assert!(stats.cycles >= 4);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.successes, stats.cycles - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_runs_back_to_back_without_overlap() {
        let period = Duration::from_secs(1);
        let scheduler = scheduler(period);
        let task = Arc::new(ScriptedTask::with_durations(vec![
            Duration::from_millis(2_500),
            Duration::from_millis(100),
            Duration::from_millis(100),
        ]));

        let stats = run_for_calls(&scheduler, task.clone(), 3).await;

        assert!(!task.overlapped.load(Ordering::SeqCst));
        let runs = task.runs.lock().clone();
        let t0 = runs[0].0;

        // Second run starts as soon as the first finishes (2.5s), off-grid
        let gap = runs[1].0.duration_since(runs[0].1);
        assert!(gap < Duration::from_millis(2));

        // Third run realigns to the grid at 3s
        let third = runs[2].0.duration_since(t0);
        assert!(third >= Duration::from_secs(3) && third < Duration::from_millis(3_002));

        // The 1s slot was dropped; the immediate run stood in for 2s
        assert_eq!(stats.skipped_ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_concurrent_run_is_rejected() {
        let scheduler = scheduler(Duration::from_secs(1));
        let task = ScriptedTask::with_durations(vec![Duration::from_millis(100); 8]);
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                token.cancel();
            })
        };

        let (first, second) = tokio::join!(
            scheduler.run(&task, token.clone()),
            scheduler.run(&task, token.clone())
        );
        canceller.await.unwrap();

        assert_matches!(second, Err(Error::Internal(msg)) if msg.contains("already running"));
        let stats = first.unwrap();
        assert!(!task.overlapped.load(Ordering::SeqCst));
        assert_eq!(stats.cycles, 3);
        assert_eq!(task.calls.load(Ordering::SeqCst), stats.cycles);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_continues_cycle_count() {
        let scheduler = scheduler(Duration::from_secs(1));
        let task = Arc::new(ScriptedTask::default());

        let first = run_for_calls(&scheduler, task.clone(), 2).await;
        assert_eq!(first.cycles, 2);

        // The active flag is released, so a later run is accepted
        let second = run_for_calls(&scheduler, task.clone(), 3).await;
        assert_eq!(second.cycles, 3);
        assert_eq!(second.successes, 3);
        assert!(!second.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_run() {
        let scheduler = scheduler(Duration::from_secs(5));
        let task = Arc::new(ScriptedTask::with_durations(vec![Duration::from_secs(2)]));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                token.cancel();
            })
        };

        let stats = scheduler.run(task.as_ref(), token).await.unwrap();
        canceller.await.unwrap();

        let runs = task.runs.lock().clone();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].1.duration_since(runs[0].0) >= Duration::from_secs(2));
        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_runs_nothing() {
        let scheduler = scheduler(Duration::from_secs(5));
        let task = ScriptedTask::default();
        let token = CancellationToken::new();
        token.cancel();

        let stats = scheduler.run(&task, token).await.unwrap();
        assert_eq!(stats.cycles, 0);
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "non-string panic payload");
    }
}
