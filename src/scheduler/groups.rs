//! Execution groups and barrier insertion for the deterministic plan.
//!
//! # Grouping
//! Consecutive main-thread systems that are mutually unordered (weak compare)
//! form one group. Each general system joins the earliest group holding a
//! main system it must precede, or the final group. Walking the groups and,
//! inside each group, its general systems before its main systems yields a
//! merged sequence consistent with the hard ordering. General systems that
//! precede no main system form the final group's tail and come last.
//!
//! # Barriers
//! The plan has two lanes: thread 0 runs the main sequence, thread 1 the
//! general sequence. A barrier is a directed hand-off: the signalling system
//! on one lane gets `after += 1`, the waiting system on the other lane gets
//! `before += 1`. Walking the merged sequence, each lane keeps a window of
//! the other lane's systems seen since its last wait. A system must wait
//! when it conflicts with, or is ordered after, anything in that window; the
//! most recent system of the other lane signals. One conflict, one barrier.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ScheduleError, ScheduleResult};
use crate::models::AccessSet;
use crate::ordering::{Comparer, SystemOrder};
use crate::resolver::ResolvedModel;

/// Main-thread systems of one priority level plus the general systems that
/// must finish before some of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionGroup {
    /// Mutually unordered main-thread systems.
    pub main: Vec<usize>,
    /// General systems that must finish before some of `main`.
    pub general: Vec<usize>,
    /// General systems with no main-thread successor (final group only).
    pub tail: Vec<usize>,
}

/// Ordered execution groups.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGroups {
    groups: Vec<ExecutionGroup>,
}

impl ExecutionGroups {
    /// Builds groups from the sorted main and general sequences.
    pub fn build(model: &ResolvedModel, main_sorted: &[usize], general_sorted: &[usize]) -> Self {
        let weak = Comparer::weak(model);
        let mut groups: Vec<ExecutionGroup> = Vec::new();

        for &m in main_sorted {
            let start_new = match groups.last() {
                None => true,
                Some(g) => g
                    .main
                    .iter()
                    .any(|&other| weak.compare(other, m) != std::cmp::Ordering::Equal),
            };
            if start_new {
                groups.push(ExecutionGroup::default());
            }
            if let Some(g) = groups.last_mut() {
                g.main.push(m);
            }
        }

        if groups.is_empty() {
            groups.push(ExecutionGroup::default());
        }

        let last = groups.len() - 1;
        for &s in general_sorted {
            let target = groups.iter().position(|g| {
                g.main
                    .iter()
                    .any(|&m| weak.compare(s, m) == std::cmp::Ordering::Less)
            });
            match target {
                Some(t) => groups[t].general.push(s),
                None => groups[last].tail.push(s),
            }
        }

        debug!(groups = groups.len(), "execution groups built");
        Self { groups }
    }

    /// The groups in execution order.
    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Merged sequence: per group, general systems, main systems, tail.
    pub fn merged(&self) -> Vec<usize> {
        self.groups
            .iter()
            .flat_map(|g| g.general.iter().chain(&g.main).chain(&g.tail).copied())
            .collect()
    }
}

/// Barrier counts attached to one system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierCount {
    /// Barriers to wait on before running.
    pub before: usize,
    /// Barriers to signal after running.
    pub after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Main,
    Worker,
}

/// Lane state while walking the merged sequence.
#[derive(Debug, Default)]
struct LaneWindow {
    /// Systems of this lane the other lane hasn't waited for yet.
    pending: Vec<usize>,
    access: AccessSet,
    clock: f64,
    busy: f64,
}

/// Two-lane schedule with directed barriers.
#[derive(Debug, Clone, Default)]
pub struct LaneSchedule {
    /// Main lane (thread 0), in execution order.
    pub main: Vec<usize>,
    /// General lane (thread 1), in execution order.
    pub general: Vec<usize>,
    /// Barrier counts per system index.
    pub barriers: HashMap<usize, BarrierCount>,
    /// Number of hand-off barriers.
    pub barrier_count: usize,
    /// Simulated finish time of each lane.
    pub finish: [f64; 2],
    /// Summed runtime cost of each lane.
    pub busy: [f64; 2],
}

impl LaneSchedule {
    /// Inserts barriers between the main and general lanes.
    ///
    /// # Errors
    /// [`ScheduleError::ImbalancedBarriers`] if the post-pass count check fails.
    pub fn build(model: &ResolvedModel, groups: &ExecutionGroups) -> ScheduleResult<Self> {
        let mut out = Self::default();
        let mut main = LaneWindow::default();
        let mut worker = LaneWindow::default();
        let mut finish: HashMap<usize, f64> = HashMap::new();

        for group in groups.groups() {
            let visits = group
                .general
                .iter()
                .map(|&s| (Lane::Worker, s))
                .chain(group.main.iter().map(|&s| (Lane::Main, s)))
                .chain(group.tail.iter().map(|&s| (Lane::Worker, s)));

            for (lane, sys) in visits {
                let (own, other) = match lane {
                    Lane::Main => (&mut main, &mut worker),
                    Lane::Worker => (&mut worker, &mut main),
                };

                let mut start = own.clock;
                let must_wait = other.access.conflicts_with(model.access(sys))
                    || other.pending.iter().any(|&p| model.must_run_before(p, sys));
                if must_wait {
                    if let Some(&signal) = other.pending.last() {
                        out.barriers.entry(signal).or_default().after += 1;
                        out.barriers.entry(sys).or_default().before += 1;
                        out.barrier_count += 1;
                        start = start.max(finish.get(&signal).copied().unwrap_or(0.0));
                        other.pending.clear();
                        other.access.clear();
                    }
                }

                let end = start + model.cost(sys);
                finish.insert(sys, end);
                own.clock = end;
                own.busy += model.cost(sys);
                own.pending.push(sys);
                own.access.merge(model.access(sys));

                match lane {
                    Lane::Main => out.main.push(sys),
                    Lane::Worker => out.general.push(sys),
                }
            }
        }

        out.finish = [main.clock, worker.clock];
        out.busy = [main.busy, worker.busy];
        out.check_balance()?;
        debug!(
            barriers = out.barrier_count,
            main = out.main.len(),
            general = out.general.len(),
            "barriers inserted"
        );
        Ok(out)
    }

    /// Barrier counts of a system (zero if none).
    pub fn count(&self, sys: usize) -> BarrierCount {
        self.barriers.get(&sys).copied().unwrap_or_default()
    }

    fn sum(&self, lane: &[usize], f: impl Fn(BarrierCount) -> usize) -> usize {
        lane.iter().map(|&s| f(self.count(s))).sum()
    }

    fn check_balance(&self) -> ScheduleResult<()> {
        let main_before = self.sum(&self.main, |c| c.before);
        let general_after = self.sum(&self.general, |c| c.after);
        if main_before != general_after {
            return Err(ScheduleError::ImbalancedBarriers {
                context: "barrier insertion",
                main: main_before,
                other: general_after,
            });
        }
        let main_after = self.sum(&self.main, |c| c.after);
        let general_before = self.sum(&self.general, |c| c.before);
        if main_after != general_before {
            return Err(ScheduleError::ImbalancedBarriers {
                context: "barrier insertion",
                main: main_after,
                other: general_before,
            });
        }
        Ok(())
    }
}
