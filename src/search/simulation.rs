//! Single simulation attempt.
//!
//! Simulates how the main sequence and the general pool interleave across
//! `thread_count` threads (thread 0 = main) over logical time. Each attempt
//! is fully deterministic given its seed.
//!
//! # Algorithm
//! Repeat until every system is placed:
//! 1. Every idle thread (shuffled, and skipped with a probability that grows
//!    with its lead over the mean busy time) tries to take work: thread 0
//!    usually tries its next main-thread system first; otherwise the first
//!    general system whose predecessors are settled and whose access doesn't
//!    conflict with what other threads touched in the current window.
//! 2. If nothing was placed, retry once without the fairness skip.
//! 3. If still nothing, advance time to the next thread completion.
//! 4. If no thread is busy either, close the window with a barrier across
//!    all threads. Too many barriers without progress abort the attempt.
//!
//! A predecessor is settled for thread `t` when it ran earlier on `t` or in
//! an earlier window. Barriers are the only cross-thread synchronization the
//! executor provides, so simulated completion time alone never settles it.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::SearchConfig;
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{AccessSet, MAIN_THREAD};
use crate::resolver::ResolvedModel;
use crate::scheduler::std_dev;

const EPS: f64 = 1e-9;

/// Upper bound on the fairness skip probability.
const MAX_SKIP_PROBABILITY: f64 = 0.95;

/// One slot in a simulated thread's task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEntry {
    /// A system, by model index.
    System(usize),
    /// A barrier across all threads.
    Barrier,
}

/// Result of one completed attempt.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// Seed that produced this outcome.
    pub seed: u64,
    /// Task lists per thread (thread 0 = main).
    pub threads: Vec<Vec<SimEntry>>,
    /// Summed runtime cost per thread.
    pub busy: Vec<f64>,
    /// Barriers inserted.
    pub barrier_count: usize,
    /// Latest thread finish plus barrier penalty.
    pub makespan: f64,
    /// Standard deviation of per-thread busy time.
    pub imbalance: f64,
}

impl SimulationOutcome {
    /// Lower makespan wins; equal makespan falls back to lower imbalance.
    pub fn is_better_than(&self, other: &SimulationOutcome) -> bool {
        if self.makespan < other.makespan - EPS {
            return true;
        }
        (self.makespan - other.makespan).abs() <= EPS && self.imbalance < other.imbalance - EPS
    }

    /// System indices on one thread, in order, without barrier markers.
    pub fn systems_on(&self, thread: usize) -> Vec<usize> {
        self.threads
            .get(thread)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| match e {
                        SimEntry::System(s) => Some(*s),
                        SimEntry::Barrier => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    thread: usize,
    window: usize,
}

enum Pick {
    Main,
    General(usize),
}

/// Simulator over fixed main and general sequences.
#[derive(Debug, Clone)]
pub struct Simulation<'a> {
    model: &'a ResolvedModel,
    main: Vec<usize>,
    general: Vec<usize>,
    scheduled: Vec<bool>,
    thread_count: usize,
    barrier_cost: f64,
    main_preference: f64,
    max_stuck_barriers: usize,
    fair_share: f64,
}

impl<'a> Simulation<'a> {
    /// Creates a simulator.
    ///
    /// `main` and `general` are expected to be sorted already; the main
    /// sequence is replayed on thread 0 in exactly this order.
    pub fn new(
        model: &'a ResolvedModel,
        main: Vec<usize>,
        general: Vec<usize>,
        config: &SearchConfig,
    ) -> Self {
        let mut scheduled = vec![false; model.len()];
        for &s in main.iter().chain(general.iter()) {
            scheduled[s] = true;
        }
        let thread_count = config.thread_count();
        let total: f64 = main.iter().chain(general.iter()).map(|&s| model.cost(s)).sum();
        Self {
            model,
            main,
            general,
            scheduled,
            thread_count,
            barrier_cost: config.barrier_cost,
            main_preference: config.main_preference.clamp(0.0, 1.0),
            max_stuck_barriers: config.max_stuck_barriers,
            fair_share: (total / thread_count as f64).max(EPS),
        }
    }

    /// The model being scheduled.
    pub fn model(&self) -> &'a ResolvedModel {
        self.model
    }

    /// Threads simulated, main included.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// The fixed main-thread sequence.
    pub fn main_sequence(&self) -> &[usize] {
        &self.main
    }

    /// Runs one attempt.
    ///
    /// # Errors
    /// [`ScheduleError::SchedulingStuck`] if barrier insertion stops making
    /// progress.
    pub fn run(&self, seed: u64) -> ScheduleResult<SimulationOutcome> {
        let mut st = Attempt::new(self, seed);
        let mut stalled_barriers = 0usize;

        while st.remaining() > 0 {
            if st.round(self, true) || (st.skipped && st.round(self, false)) {
                stalled_barriers = 0;
                continue;
            }

            if let Some(next) = st.next_completion() {
                st.now = next;
                continue;
            }

            stalled_barriers += 1;
            if stalled_barriers > self.max_stuck_barriers {
                return Err(ScheduleError::SchedulingStuck {
                    seed,
                    pending: st.remaining(),
                });
            }
            if st.window_has_work {
                st.barrier();
            }
        }

        Ok(st.finish(self))
    }
}

/// Mutable state of one attempt.
struct Attempt {
    seed: u64,
    rng: SmallRng,
    now: f64,
    clock: Vec<f64>,
    busy: Vec<f64>,
    window: usize,
    window_access: Vec<AccessSet>,
    window_has_work: bool,
    placed: Vec<Option<Placement>>,
    main_queue: VecDeque<usize>,
    pool: Vec<usize>,
    threads: Vec<Vec<SimEntry>>,
    skipped: bool,
}

impl Attempt {
    fn new(sim: &Simulation<'_>, seed: u64) -> Self {
        let n = sim.thread_count;
        Self {
            seed,
            rng: SmallRng::seed_from_u64(seed),
            now: 0.0,
            clock: vec![0.0; n],
            busy: vec![0.0; n],
            window: 0,
            window_access: vec![AccessSet::default(); n],
            window_has_work: false,
            placed: vec![None; sim.model.len()],
            main_queue: sim.main.iter().copied().collect(),
            pool: sim.general.clone(),
            threads: vec![Vec::new(); n],
            skipped: false,
        }
    }

    fn remaining(&self) -> usize {
        self.main_queue.len() + self.pool.len()
    }

    /// Gives work to idle threads. Returns whether anything was placed.
    fn round(&mut self, sim: &Simulation<'_>, fair: bool) -> bool {
        let mut idle: Vec<usize> = (0..sim.thread_count)
            .filter(|&t| self.clock[t] <= self.now + EPS)
            .collect();
        idle.shuffle(&mut self.rng);

        let mean = self.busy.iter().sum::<f64>() / sim.thread_count as f64;
        let mut progressed = false;
        if fair {
            self.skipped = false;
        }

        for t in idle {
            if fair {
                let lead = self.busy[t] - mean;
                if lead > EPS {
                    let p = (lead / sim.fair_share).min(MAX_SKIP_PROBABILITY);
                    if self.rng.random_bool(p) {
                        self.skipped = true;
                        continue;
                    }
                }
            }
            if let Some(pick) = self.pick(sim, t) {
                let sys = match pick {
                    Pick::Main => match self.main_queue.pop_front() {
                        Some(s) => s,
                        None => continue,
                    },
                    Pick::General(pos) => self.pool.remove(pos),
                };
                self.assign(sim, sys, t);
                progressed = true;
            }
        }
        progressed
    }

    fn pick(&mut self, sim: &Simulation<'_>, t: usize) -> Option<Pick> {
        let has_main = t == MAIN_THREAD && !self.main_queue.is_empty();
        let main_first = has_main && self.rng.random_bool(sim.main_preference);

        if main_first && self.main_ready(sim) {
            return Some(Pick::Main);
        }
        if let Some(pos) = self
            .pool
            .iter()
            .position(|&g| self.is_eligible(sim, g, t))
        {
            return Some(Pick::General(pos));
        }
        if has_main && !main_first && self.main_ready(sim) {
            return Some(Pick::Main);
        }
        None
    }

    fn main_ready(&self, sim: &Simulation<'_>) -> bool {
        self.main_queue
            .front()
            .is_some_and(|&m| self.is_eligible(sim, m, MAIN_THREAD))
    }

    fn is_eligible(&self, sim: &Simulation<'_>, sys: usize, t: usize) -> bool {
        let settled = sim.model.after_closure(sys).iter().all(|&p| {
            if !sim.scheduled[p] {
                return true;
            }
            match self.placed[p] {
                Some(pl) => pl.thread == t || pl.window < self.window,
                None => false,
            }
        });
        if !settled {
            return false;
        }
        let access = sim.model.access(sys);
        self.window_access
            .iter()
            .enumerate()
            .all(|(u, w)| u == t || !w.conflicts_with(access))
    }

    fn assign(&mut self, sim: &Simulation<'_>, sys: usize, t: usize) {
        let cost = sim.model.cost(sys);
        self.placed[sys] = Some(Placement {
            thread: t,
            window: self.window,
        });
        self.threads[t].push(SimEntry::System(sys));
        self.window_access[t].merge(sim.model.access(sys));
        self.window_has_work = true;
        self.clock[t] = self.now + cost;
        self.busy[t] += cost;
    }

    fn next_completion(&self) -> Option<f64> {
        self.clock
            .iter()
            .copied()
            .filter(|&c| c > self.now + EPS)
            .min_by(|a, b| a.total_cmp(b))
    }

    fn barrier(&mut self) {
        let latest = self.clock.iter().copied().fold(self.now, f64::max);
        self.now = latest;
        for c in &mut self.clock {
            *c = latest;
        }
        for (list, access) in self.threads.iter_mut().zip(self.window_access.iter_mut()) {
            list.push(SimEntry::Barrier);
            access.clear();
        }
        self.window += 1;
        self.window_has_work = false;
    }

    fn finish(self, sim: &Simulation<'_>) -> SimulationOutcome {
        let end = self.clock.iter().copied().fold(0.0, f64::max);
        SimulationOutcome {
            seed: self.seed,
            imbalance: std_dev(&self.busy),
            makespan: end + self.window as f64 * sim.barrier_cost,
            threads: self.threads,
            busy: self.busy,
            barrier_count: self.window,
        }
    }
}
