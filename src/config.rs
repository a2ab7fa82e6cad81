//! Search configuration.
//!
//! Collects every tunable of the randomized thread-assignment search. The
//! defaults suit build tooling: a few seconds of search, stopping once no
//! improvement has been seen for two seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for plan synthesis.
///
/// # Example
/// ```
/// use sys_schedule::config::SearchConfig;
///
/// let config = SearchConfig::default()
///     .with_worker_threads(4)
///     .with_seed(7)
///     .with_max_attempts(200);
/// assert_eq!(config.thread_count(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Worker threads besides the main thread.
    pub worker_threads: usize,
    /// Top-level random seed.
    pub seed: u64,
    /// Makespan penalty charged per barrier.
    pub barrier_cost: f64,
    /// Stop once this long has passed without an improvement (ms).
    pub patience_ms: u64,
    /// Optional cap on the total number of attempts.
    pub max_attempts: Option<u64>,
    /// Parallel search workers. `None` = available parallelism.
    pub search_workers: Option<usize>,
    /// Probability that thread 0 tries its next main-thread system first.
    pub main_preference: f64,
    /// Consecutive barrier insertions without progress before an attempt fails.
    pub max_stuck_barriers: usize,
    /// Consecutive failed attempts before a search worker gives up.
    pub max_failed_attempts: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            worker_threads: 3,
            seed: 0,
            barrier_cost: 1.0,
            patience_ms: 2_000,
            max_attempts: None,
            search_workers: None,
            main_preference: 0.9,
            max_stuck_barriers: 3,
            max_failed_attempts: 64,
        }
    }
}

impl SearchConfig {
    /// Sets the number of worker threads.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets the top-level seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the per-barrier makespan penalty.
    pub fn with_barrier_cost(mut self, cost: f64) -> Self {
        self.barrier_cost = cost.max(0.0);
        self
    }

    /// Sets the no-improvement grace period.
    pub fn with_patience(mut self, patience: Duration) -> Self {
        self.patience_ms = u64::try_from(patience.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Caps the total number of attempts.
    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the number of parallel search workers.
    pub fn with_search_workers(mut self, workers: usize) -> Self {
        self.search_workers = Some(workers.max(1));
        self
    }

    /// Sets the main-thread preference probability.
    pub fn with_main_preference(mut self, p: f64) -> Self {
        self.main_preference = p.clamp(0.0, 1.0);
        self
    }

    /// Sets the stuck-barrier retry budget.
    pub fn with_max_stuck_barriers(mut self, n: usize) -> Self {
        self.max_stuck_barriers = n;
        self
    }

    /// Sets the per-worker failed-attempt budget.
    pub fn with_max_failed_attempts(mut self, n: u64) -> Self {
        self.max_failed_attempts = n.max(1);
        self
    }

    /// Threads in the plan, main included.
    pub fn thread_count(&self) -> usize {
        self.worker_threads + 1
    }

    /// No-improvement grace period.
    pub fn patience(&self) -> Duration {
        Duration::from_millis(self.patience_ms)
    }

    /// Search workers to spawn.
    pub fn effective_search_workers(&self) -> usize {
        self.search_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SearchConfig::default();
        assert_eq!(c.worker_threads, 3);
        assert_eq!(c.thread_count(), 4);
        assert_eq!(c.patience(), Duration::from_secs(2));
        assert!(c.max_attempts.is_none());
        assert!(c.effective_search_workers() >= 1);
    }

    #[test]
    fn test_builder_clamps() {
        let c = SearchConfig::default()
            .with_main_preference(1.5)
            .with_barrier_cost(-2.0)
            .with_search_workers(0)
            .with_max_failed_attempts(0);
        assert_eq!(c.main_preference, 1.0);
        assert_eq!(c.barrier_cost, 0.0);
        assert_eq!(c.search_workers, Some(1));
        assert_eq!(c.max_failed_attempts, 1);
    }

    #[test]
    fn test_patience_saturates() {
        let c = SearchConfig::default().with_patience(Duration::MAX);
        assert_eq!(c.patience_ms, u64::MAX);
        let c = SearchConfig::default().with_patience(Duration::from_millis(50));
        assert_eq!(c.patience(), Duration::from_millis(50));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let c: SearchConfig =
            serde_json::from_str(r#"{"worker_threads": 6, "seed": 42}"#).unwrap();
        assert_eq!(c.worker_threads, 6);
        assert_eq!(c.seed, 42);
        assert_eq!(c.patience_ms, 2_000);
        assert_eq!(c.main_preference, 0.9);
    }
}
