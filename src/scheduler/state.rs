//! Fixed-rate schedule arithmetic
//!
//! Tick `k` is due at `start + k * period`. When a run finishes after the next
//! due instant, the next run starts immediately and the missed slots are
//! dropped; later ticks realign to the `start + k * period` grid.

use std::time::Duration;

use tokio::time::Instant;

/// Result of advancing the schedule after a run completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// When the next run should start
    pub next_fire: Instant,
    /// Grid slots dropped because the previous run overran
    pub skipped: u64,
    /// Whether the next run starts off-grid, immediately on completion
    pub immediate: bool,
}

/// Process-local schedule state; never persisted
#[derive(Debug, Clone)]
pub struct ScheduleState {
    start: Instant,
    period: Duration,
    slot: u64,
    next_fire: Instant,
    cycle: u64,
    skipped: u64,
}

impl ScheduleState {
    /// Schedule anchored at `start`; the first tick is due immediately.
    ///
    /// `period` must be non-zero.
    pub fn new(start: Instant, period: Duration) -> Self {
        Self::resume(start, period, 0)
    }

    /// Fresh grid anchored at `start` whose cycle numbering continues after
    /// `cycle` runs from an earlier schedule
    pub fn resume(start: Instant, period: Duration, cycle: u64) -> Self {
        Self {
            start,
            period,
            slot: 0,
            next_fire: start,
            cycle,
            skipped: 0,
        }
    }

    /// When the next run is due
    pub fn next_fire(&self) -> Instant {
        self.next_fire
    }

    /// Grid slot the next run belongs to
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Runs started so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Grid slots dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Instant of grid slot `slot`
    pub fn due_at(&self, slot: u64) -> Instant {
        let nanos = self.period.as_nanos().saturating_mul(u128::from(slot));
        let offset = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        self.start + offset
    }

    /// Mark the start of a run and return its 1-based cycle number
    pub fn begin(&mut self) -> u64 {
        self.cycle += 1;
        self.cycle
    }

    /// Advance past a run that finished at `finished_at`
    pub fn complete(&mut self, finished_at: Instant) -> Advance {
        let nominal_slot = self.slot + 1;
        let nominal = self.due_at(nominal_slot);

        if finished_at <= nominal {
            self.slot = nominal_slot;
            self.next_fire = nominal;
            return Advance {
                next_fire: nominal,
                skipped: 0,
                immediate: false,
            };
        }

        // Overran: fire now, as the slot containing `finished_at`
        let elapsed = finished_at.duration_since(self.start).as_nanos();
        let current = u64::try_from(elapsed / self.period.as_nanos()).unwrap_or(u64::MAX);
        let current = current.max(nominal_slot);
        let skipped = current - nominal_slot;

        self.slot = current;
        self.next_fire = finished_at;
        self.skipped += skipped;

        Advance {
            next_fire: finished_at,
            skipped,
            immediate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PERIOD: Duration = Duration::from_secs(5);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_tick_is_immediate() {
        let start = Instant::now();
        let state = ScheduleState::new(start, PERIOD);
        assert_eq!(state.next_fire(), start);
        assert_eq!(state.cycle(), 0);
    }

    #[test]
    fn test_fast_runs_stay_on_grid() {
        let start = Instant::now();
        let mut state = ScheduleState::new(start, PERIOD);

        for k in 0..4u32 {
            let fired = state.next_fire();
            assert_eq!(fired, start + PERIOD * k);
            state.begin();
            let advance = state.complete(fired + ms(10));
            assert!(!advance.immediate);
            assert_eq!(advance.skipped, 0);
        }
        assert_eq!(state.cycle(), 4);
        assert_eq!(state.next_fire(), start + PERIOD * 4);
    }

    #[test]
    fn test_run_ending_exactly_on_boundary_is_on_grid() {
        let start = Instant::now();
        let mut state = ScheduleState::new(start, PERIOD);
        state.begin();
        let advance = state.complete(start + PERIOD);
        assert!(!advance.immediate);
        assert_eq!(advance.next_fire, start + PERIOD);
    }

    #[test]
    fn test_overrun_fires_immediately_then_realigns() {
        let start = Instant::now();
        let mut state = ScheduleState::new(start, PERIOD);

        // First run takes 6s: next run starts at 6s, off-grid
        state.begin();
        let advance = state.complete(start + ms(6_000));
        assert!(advance.immediate);
        assert_eq!(advance.skipped, 0);
        assert_eq!(advance.next_fire, start + ms(6_000));

        // Second run is quick: back on the grid at 10s
        state.begin();
        let advance = state.complete(start + ms(6_050));
        assert!(!advance.immediate);
        assert_eq!(advance.next_fire, start + ms(10_000));
    }

    #[test]
    fn test_long_overrun_drops_missed_slots() {
        let start = Instant::now();
        let mut state = ScheduleState::new(start, PERIOD);

        state.begin();
        let advance = state.complete(start + ms(17_000));
        assert!(advance.immediate);
        // Slots at 5s and 10s are dropped; the immediate run stands in for 15s
        assert_eq!(advance.skipped, 2);
        assert_eq!(state.slot(), 3);

        state.begin();
        let advance = state.complete(start + ms(17_100));
        assert_eq!(advance.next_fire, start + ms(20_000));
        assert_eq!(state.skipped(), 2);
    }

    #[test]
    fn test_resume_continues_cycle_numbering() {
        let start = Instant::now();
        let mut state = ScheduleState::resume(start, PERIOD, 7);
        assert_eq!(state.next_fire(), start);
        assert_eq!(state.begin(), 8);
        assert_eq!(state.slot(), 0);
    }

    #[test]
    fn test_due_at_saturates() {
        let start = Instant::now();
        let state = ScheduleState::new(start, PERIOD);
        assert_eq!(state.due_at(3), start + ms(15_000));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Runs never overlap, gaps stay within max(period, run time), and
        /// every on-grid fire lands on start + k * period.
        #[test]
        fn prop_fixed_rate_bounds(
            period_ms in 1u64..2_000,
            runs in prop::collection::vec(0u64..6_000, 1..40),
        ) {
            let period = ms(period_ms);
            let start = Instant::now();
            let mut state = ScheduleState::new(start, period);
            let mut fired = state.next_fire();

            for run_ms in runs {
                state.begin();
                let finished = fired + ms(run_ms);
                let advance = state.complete(finished);
                let next = advance.next_fire;

                // No overlap with the run that just finished
                prop_assert!(next >= finished);

                // Gap between starts is bounded
                let gap = next.duration_since(fired);
                prop_assert!(gap <= period.max(ms(run_ms)));

                if advance.immediate {
                    prop_assert_eq!(next, finished);
                } else {
                    prop_assert_eq!(next, state.due_at(state.slot()));
                    prop_assert_eq!(advance.skipped, 0);
                }

                fired = next;
            }
        }

        /// Once runs are short again the schedule is back on the grid
        /// within one tick.
        #[test]
        fn prop_realigns_after_backlog(
            period_ms in 10u64..1_000,
            overrun_factor in 1u64..10,
        ) {
            let period = ms(period_ms);
            let start = Instant::now();
            let mut state = ScheduleState::new(start, period);

            state.begin();
            let finished = start + ms(period_ms * overrun_factor + 1);
            let advance = state.complete(finished);
            prop_assert!(advance.immediate);

            state.begin();
            let advance = state.complete(finished);
            prop_assert!(!advance.immediate);
            let offset = advance.next_fire.duration_since(start).as_nanos();
            prop_assert_eq!(offset % period.as_nanos(), 0);
        }
    }
}
