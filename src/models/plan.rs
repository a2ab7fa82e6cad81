//! Execution plan (solution) model.
//!
//! A plan assigns every system a thread, an ordinal position on that thread,
//! a timeslot (number of barriers crossed before it runs) and the number of
//! barriers it must honour immediately before and after running.
//!
//! The plan is a write-once record keyed by system id. Descriptors are never
//! mutated to carry scheduling results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::SystemCategory;

/// Thread id reserved for main-thread systems.
pub const MAIN_THREAD: usize = 0;

/// Scheduling result for one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSystem {
    /// System id.
    pub system_id: String,
    /// Pool the system was scheduled from.
    pub category: SystemCategory,
    /// Thread the system runs on (0 = main).
    pub thread_id: usize,
    /// Position within its thread (0-based, dense).
    pub order: usize,
    /// Barriers crossed on this thread before the system runs.
    pub timeslot: usize,
    /// Barriers to wait on immediately before running.
    pub barriers_before: usize,
    /// Barriers to signal immediately after running.
    pub barriers_after: usize,
}

impl PlannedSystem {
    /// Creates an entry with no barriers.
    pub fn new(
        system_id: impl Into<String>,
        category: SystemCategory,
        thread_id: usize,
        order: usize,
        timeslot: usize,
    ) -> Self {
        Self {
            system_id: system_id.into(),
            category,
            thread_id,
            order,
            timeslot,
            barriers_before: 0,
            barriers_after: 0,
        }
    }

    /// Sets the barrier counts.
    pub fn with_barriers(mut self, before: usize, after: usize) -> Self {
        self.barriers_before = before;
        self.barriers_after = after;
        self
    }

    /// Total barriers attached to this system.
    #[inline]
    pub fn barrier_total(&self) -> usize {
        self.barriers_before + self.barriers_after
    }
}

/// How a plan was produced. Selects the barrier balance rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanKind {
    /// Sorted two-lane plan: main sequence on thread 0, general sequence on
    /// thread 1. Barriers are directed hand-offs between the two lanes.
    #[default]
    Deterministic,
    /// Simulated multi-thread plan. Barriers are rendezvous of all threads.
    Optimized,
}

/// Per-thread summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPlan {
    /// Thread id (0 = main).
    pub thread_id: usize,
    /// Barriers this thread takes part in.
    pub barrier_count: usize,
    /// Barriers the thread passes without running any system.
    pub idle_barriers: usize,
    /// Sum of runtime costs of the systems on this thread.
    pub busy_time: f64,
}

impl ThreadPlan {
    /// Creates an empty thread summary.
    pub fn new(thread_id: usize) -> Self {
        Self {
            thread_id,
            barrier_count: 0,
            idle_barriers: 0,
            busy_time: 0.0,
        }
    }
}

/// A complete multi-threaded execution plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// How the plan was produced.
    pub kind: PlanKind,
    /// Scheduled main and general systems.
    pub systems: Vec<PlannedSystem>,
    /// Per-thread summaries, indexed by thread id.
    pub threads: Vec<ThreadPlan>,
    /// Frame-category systems in sorted order.
    pub frame_order: Vec<String>,
    /// Distinct barriers in the plan.
    pub barrier_count: usize,
    /// Estimated wall-clock cost, barrier penalty included.
    pub makespan: f64,
    /// Standard deviation of per-thread busy time.
    pub imbalance: f64,
    /// Seed of the winning simulation, for optimized plans.
    pub seed: Option<u64>,
}

impl ExecutionPlan {
    /// Creates an empty plan with `thread_count` threads.
    pub fn new(kind: PlanKind, thread_count: usize) -> Self {
        Self {
            kind,
            threads: (0..thread_count).map(ThreadPlan::new).collect(),
            ..Self::default()
        }
    }

    /// Number of threads (main included).
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Adds a planned system.
    pub fn add_system(&mut self, system: PlannedSystem) {
        self.systems.push(system);
    }

    /// Finds the entry for a system id.
    pub fn get(&self, system_id: &str) -> Option<&PlannedSystem> {
        self.systems.iter().find(|s| s.system_id == system_id)
    }

    /// Entries on one thread, ordered by position.
    pub fn systems_on_thread(&self, thread_id: usize) -> Vec<&PlannedSystem> {
        let mut out: Vec<&PlannedSystem> = self
            .systems
            .iter()
            .filter(|s| s.thread_id == thread_id)
            .collect();
        out.sort_by_key(|s| s.order);
        out
    }

    /// System ids on one thread, ordered by position.
    pub fn thread_order(&self, thread_id: usize) -> Vec<&str> {
        self.systems_on_thread(thread_id)
            .into_iter()
            .map(|s| s.system_id.as_str())
            .collect()
    }

    /// Entries grouped by thread id, each group ordered by position.
    pub fn by_thread(&self) -> Vec<Vec<&PlannedSystem>> {
        (0..self.thread_count())
            .map(|t| self.systems_on_thread(t))
            .collect()
    }

    /// Sum of `barriers_before` on a thread.
    pub fn barriers_before_on(&self, thread_id: usize) -> usize {
        self.systems
            .iter()
            .filter(|s| s.thread_id == thread_id)
            .map(|s| s.barriers_before)
            .sum()
    }

    /// Sum of `barriers_after` on a thread.
    pub fn barriers_after_on(&self, thread_id: usize) -> usize {
        self.systems
            .iter()
            .filter(|s| s.thread_id == thread_id)
            .map(|s| s.barriers_after)
            .sum()
    }

    /// Thread id for every planned system.
    pub fn thread_map(&self) -> HashMap<&str, usize> {
        self.systems
            .iter()
            .map(|s| (s.system_id.as_str(), s.thread_id))
            .collect()
    }

    /// Number of planned (non-frame) systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }
}
