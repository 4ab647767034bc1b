//! Rolling percentile window
//!
//! Keeps the duration samples observed within a trailing time window and
//! answers nearest-rank quantile queries over them.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Samples older than `window` are evicted; at most `max_samples` are kept.
#[derive(Debug)]
pub struct RollingQuantiles {
    window: Duration,
    max_samples: usize,
    samples: Mutex<VecDeque<(Instant, f64)>>,
}

impl RollingQuantiles {
    /// Create an empty window
    pub fn new(window: Duration, max_samples: usize) -> Self {
        Self {
            window,
            max_samples: max_samples.max(1),
            samples: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a sample observed now
    pub fn record(&self, value: f64) {
        self.record_at(Instant::now(), value);
    }

    /// Record a sample observed at `at`
    pub fn record_at(&self, at: Instant, value: f64) {
        let mut samples = self.samples.lock();
        samples.push_back((at, value));
        while samples.len() > self.max_samples {
            samples.pop_front();
        }
        Self::evict(&mut samples, at, self.window);
    }

    /// Quantile `q` (0.0..=1.0) over the samples still in the window
    pub fn quantile(&self, q: f64) -> Option<f64> {
        self.quantiles_at(Instant::now(), &[q])
            .into_iter()
            .next()
            .flatten()
    }

    /// Several quantiles at once, evaluated at `now`
    pub fn quantiles_at(&self, now: Instant, qs: &[f64]) -> Vec<Option<f64>> {
        let mut samples = self.samples.lock();
        Self::evict(&mut samples, now, self.window);

        let mut values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
        drop(samples);

        values.sort_by(|a, b| a.total_cmp(b));
        qs.iter().map(|q| nearest_rank(&values, *q)).collect()
    }

    /// Number of samples currently retained
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether the window holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    fn evict(samples: &mut VecDeque<(Instant, f64)>, now: Instant, window: Duration) {
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };
        while samples.front().is_some_and(|(at, _)| *at < cutoff) {
            samples.pop_front();
        }
    }
}

/// Nearest-rank quantile over sorted values
fn nearest_rank(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let rank = (q * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}
