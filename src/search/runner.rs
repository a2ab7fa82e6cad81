//! Parallel multi-start search.
//!
//! Runs independent simulation attempts on a rayon pool. Each search worker
//! owns its RNG and attempt state; the only shared mutable data is the best
//! outcome and the time of the last improvement, held behind one lock.
//!
//! # Stopping rule
//! A worker exits when
//! - a best outcome exists and more than `patience` has elapsed since the
//!   last improvement,
//! - the optional `max_attempts` cap has been claimed, or
//! - `max_failed_attempts` of its own attempts failed in a row.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use super::simulation::{Simulation, SimulationOutcome};
use crate::config::SearchConfig;
use crate::error::{ScheduleError, ScheduleResult};

/// Summary of a finished search.
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Best outcome found.
    pub best: SimulationOutcome,
    /// Attempts that ran to completion or failed.
    pub attempts: u64,
    /// Attempts that ended in [`ScheduleError::SchedulingStuck`].
    pub failures: u64,
    /// Times the shared best was replaced.
    pub improvements: u64,
    /// Wall-clock duration of the search.
    pub elapsed: Duration,
}

struct SharedBest {
    best: Option<SimulationOutcome>,
    last_improvement: Instant,
    improvements: u64,
}

#[derive(Default)]
struct Counters {
    claimed: AtomicU64,
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Multi-start search over a [`Simulation`].
pub struct SearchRunner<'s, 'a> {
    simulation: &'s Simulation<'a>,
    config: &'s SearchConfig,
}

impl<'s, 'a> SearchRunner<'s, 'a> {
    /// Creates a runner.
    pub fn new(simulation: &'s Simulation<'a>, config: &'s SearchConfig) -> Self {
        Self { simulation, config }
    }

    /// Runs the search to completion.
    ///
    /// # Errors
    /// [`ScheduleError::NoValidOrdering`] if no attempt completed.
    pub fn run(&self) -> ScheduleResult<SearchReport> {
        let started = Instant::now();
        let workers = self.config.effective_search_workers();
        let mut top = SmallRng::seed_from_u64(self.config.seed);
        let seeds: Vec<u64> = (0..workers).map(|_| top.random()).collect();

        info!(
            workers,
            threads = self.simulation.thread_count(),
            systems = self.simulation.model().len(),
            "search started"
        );

        let shared = Mutex::new(SharedBest {
            best: None,
            last_improvement: Instant::now(),
            improvements: 0,
        });
        let counters = Counters::default();

        seeds
            .into_par_iter()
            .enumerate()
            .for_each(|(worker, seed)| self.worker(worker, seed, &shared, &counters));

        let state = shared.into_inner();
        let attempts = counters.attempts.load(Ordering::Relaxed);
        let failures = counters.failures.load(Ordering::Relaxed);
        let elapsed = started.elapsed();

        let best = state
            .best
            .ok_or(ScheduleError::NoValidOrdering { attempts })?;

        info!(
            attempts,
            failures,
            improvements = state.improvements,
            makespan = best.makespan,
            imbalance = best.imbalance,
            barriers = best.barrier_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "search finished"
        );

        Ok(SearchReport {
            best,
            attempts,
            failures,
            improvements: state.improvements,
            elapsed,
        })
    }

    fn worker(&self, worker: usize, seed: u64, shared: &Mutex<SharedBest>, counters: &Counters) {
        let patience = self.config.patience();
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut failed_in_row = 0u64;

        loop {
            {
                let state = shared.lock();
                if state.best.is_some() && state.last_improvement.elapsed() > patience {
                    break;
                }
            }
            if let Some(max) = self.config.max_attempts {
                if counters.claimed.fetch_add(1, Ordering::Relaxed) >= max {
                    break;
                }
            }

            let attempt_seed: u64 = rng.random();
            counters.attempts.fetch_add(1, Ordering::Relaxed);

            match self.simulation.run(attempt_seed) {
                Ok(outcome) => {
                    failed_in_row = 0;
                    trace!(
                        worker,
                        seed = attempt_seed,
                        makespan = outcome.makespan,
                        imbalance = outcome.imbalance,
                        "attempt completed"
                    );
                    let mut state = shared.lock();
                    let improved = match &state.best {
                        Some(best) => outcome.is_better_than(best),
                        None => true,
                    };
                    if improved {
                        debug!(
                            worker,
                            seed = attempt_seed,
                            makespan = outcome.makespan,
                            imbalance = outcome.imbalance,
                            barriers = outcome.barrier_count,
                            "new best"
                        );
                        state.best = Some(outcome);
                        state.last_improvement = Instant::now();
                        state.improvements += 1;
                    }
                }
                Err(err) => {
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    failed_in_row += 1;
                    trace!(worker, seed = attempt_seed, %err, "attempt failed");
                    if failed_in_row >= self.config.max_failed_attempts {
                        warn!(worker, failed_in_row, "search worker gave up");
                        break;
                    }
                }
            }
        }
    }
}
