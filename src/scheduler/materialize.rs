//! Plan materialization.
//!
//! Turns a lane schedule or a winning simulation into an [`ExecutionPlan`]:
//! every system gets its thread, its position on that thread, its timeslot
//! (barriers crossed so far on that thread) and the barrier counts it must
//! honour around it. A final balance check guards the barrier bookkeeping.

use tracing::debug;

use super::groups::LaneSchedule;
use super::kpi::std_dev;
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{ExecutionPlan, PlanKind, PlannedSystem, MAIN_THREAD};
use crate::resolver::ResolvedModel;
use crate::search::{SimEntry, SimulationOutcome};

const GENERAL_LANE: usize = 1;

/// Builds a deterministic two-lane plan.
///
/// # Errors
/// [`ScheduleError::ImbalancedBarriers`] if the hand-off counts don't pair up.
pub fn materialize_lanes(
    model: &ResolvedModel,
    lanes: &LaneSchedule,
    frame_order: Vec<String>,
    barrier_cost: f64,
) -> ScheduleResult<ExecutionPlan> {
    let mut plan = ExecutionPlan::new(PlanKind::Deterministic, 2);

    for (thread, lane) in [(MAIN_THREAD, &lanes.main), (GENERAL_LANE, &lanes.general)] {
        let mut slot = 0;
        for (order, &sys) in lane.iter().enumerate() {
            let count = lanes.count(sys);
            slot += count.before;
            plan.add_system(
                PlannedSystem::new(model.id(sys), model.category(sys), thread, order, slot)
                    .with_barriers(count.before, count.after),
            );
            slot += count.after;
        }
        if let Some(summary) = plan.threads.get_mut(thread) {
            summary.barrier_count = slot;
            summary.busy_time = lanes.busy[thread];
        }
    }

    plan.frame_order = frame_order;
    plan.barrier_count = lanes.barrier_count;
    plan.makespan =
        lanes.finish.iter().copied().fold(0.0, f64::max) + lanes.barrier_count as f64 * barrier_cost;
    plan.imbalance = std_dev(&lanes.busy);

    check_hand_offs(&plan)?;
    debug!(
        systems = plan.system_count(),
        barriers = plan.barrier_count,
        makespan = plan.makespan,
        "deterministic plan materialized"
    );
    Ok(plan)
}

/// Builds an optimized plan from a simulation outcome.
///
/// A barrier marker attaches to the system before it on the same thread, to
/// the next system when the thread hasn't run anything yet, or counts as an
/// idle barrier on a thread that runs nothing.
///
/// # Errors
/// [`ScheduleError::ImbalancedBarriers`] if some thread does not take part
/// in every barrier.
pub fn materialize_simulation(
    model: &ResolvedModel,
    outcome: &SimulationOutcome,
    frame_order: Vec<String>,
) -> ScheduleResult<ExecutionPlan> {
    let mut plan = ExecutionPlan::new(PlanKind::Optimized, outcome.threads.len());

    for (thread, entries) in outcome.threads.iter().enumerate() {
        let mut slot = 0;
        let mut order = 0;
        let mut leading = 0;
        let mut previous: Option<usize> = None;

        for entry in entries {
            match *entry {
                SimEntry::System(sys) => {
                    let before = if previous.is_none() { leading } else { 0 };
                    plan.add_system(
                        PlannedSystem::new(model.id(sys), model.category(sys), thread, order, slot)
                            .with_barriers(before, 0),
                    );
                    previous = Some(plan.systems.len() - 1);
                    order += 1;
                }
                SimEntry::Barrier => {
                    slot += 1;
                    match previous {
                        Some(at) => plan.systems[at].barriers_after += 1,
                        None => leading += 1,
                    }
                }
            }
        }

        if let Some(summary) = plan.threads.get_mut(thread) {
            summary.barrier_count = slot;
            summary.idle_barriers = if previous.is_none() { leading } else { 0 };
            summary.busy_time = outcome.busy.get(thread).copied().unwrap_or(0.0);
        }
    }

    plan.frame_order = frame_order;
    plan.barrier_count = outcome.barrier_count;
    plan.makespan = outcome.makespan;
    plan.imbalance = outcome.imbalance;
    plan.seed = Some(outcome.seed);

    check_rendezvous(&plan)?;
    debug!(
        systems = plan.system_count(),
        barriers = plan.barrier_count,
        makespan = plan.makespan,
        seed = outcome.seed,
        "optimized plan materialized"
    );
    Ok(plan)
}

fn check_hand_offs(plan: &ExecutionPlan) -> ScheduleResult<()> {
    let pairs = [
        (plan.barriers_before_on(MAIN_THREAD), plan.barriers_after_on(GENERAL_LANE)),
        (plan.barriers_after_on(MAIN_THREAD), plan.barriers_before_on(GENERAL_LANE)),
    ];
    for (main, other) in pairs {
        if main != other {
            return Err(ScheduleError::ImbalancedBarriers {
                context: "plan materialization",
                main,
                other,
            });
        }
    }
    Ok(())
}

fn thread_total(plan: &ExecutionPlan, thread: usize) -> usize {
    plan.barriers_before_on(thread)
        + plan.barriers_after_on(thread)
        + plan.threads.get(thread).map_or(0, |t| t.idle_barriers)
}

fn check_rendezvous(plan: &ExecutionPlan) -> ScheduleResult<()> {
    let main = thread_total(plan, MAIN_THREAD);
    for thread in 1..plan.thread_count() {
        let other = thread_total(plan, thread);
        if other != main {
            return Err(ScheduleError::ImbalancedBarriers {
                context: "plan materialization",
                main,
                other,
            });
        }
    }
    if main != plan.barrier_count {
        return Err(ScheduleError::ImbalancedBarriers {
            context: "plan materialization",
            main,
            other: plan.barrier_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SystemCategory, SystemDescriptor};
    use crate::scheduler::groups::ExecutionGroups;

    fn lanes_model() -> ResolvedModel {
        ResolvedModel::resolve(&[
            SystemDescriptor::new("m1").on_main_thread().writes("A"),
            SystemDescriptor::new("m2").on_main_thread().reads("B").runs_after("m1"),
            SystemDescriptor::new("g1").reads("A").writes("B").runs_before("m2"),
            SystemDescriptor::new("g2").writes("C"),
        ])
        .unwrap()
    }

    #[test]
    fn test_lane_plan_timeslots_follow_barriers() {
        let model = lanes_model();
        let groups = ExecutionGroups::build(&model, &[0, 1], &[2, 3]);
        let lanes = LaneSchedule::build(&model, &groups).unwrap();
        let plan = materialize_lanes(&model, &lanes, vec![], 1.0).unwrap();

        // m1 -> g1 -> m2 hand-offs.
        let m1 = plan.get("m1").unwrap();
        let g1 = plan.get("g1").unwrap();
        let m2 = plan.get("m2").unwrap();
        assert_eq!((m1.timeslot, m1.barriers_after), (0, 1));
        assert_eq!((g1.timeslot, g1.barriers_before, g1.barriers_after), (1, 1, 1));
        assert_eq!((m2.timeslot, m2.barriers_before), (2, 1));
        assert_eq!(plan.barrier_count, 2);
        assert_eq!(plan.kind, PlanKind::Deterministic);
        assert_eq!(plan.thread_order(0), vec!["m1", "m2"]);
        assert_eq!(plan.thread_order(1), vec!["g1", "g2"]);
        assert_eq!(plan.threads[0].barrier_count, 2);
        assert_eq!(plan.threads[1].barrier_count, 2);
    }

    #[test]
    fn test_lane_plan_carries_frame_order() {
        let model = lanes_model();
        let groups = ExecutionGroups::build(&model, &[0, 1], &[2, 3]);
        let lanes = LaneSchedule::build(&model, &groups).unwrap();
        let plan = materialize_lanes(&model, &lanes, vec!["late".into()], 0.5).unwrap();
        assert_eq!(plan.frame_order, vec!["late".to_string()]);
        assert!(plan.seed.is_none());
        // Lane finishes: main 1 + 1 (waits for g1 at 2) -> 3; penalty 2 x 0.5.
        assert!((plan.makespan - 4.0).abs() < 1e-9);
    }

    fn outcome() -> SimulationOutcome {
        SimulationOutcome {
            seed: 5,
            threads: vec![
                vec![SimEntry::System(0), SimEntry::Barrier, SimEntry::System(1)],
                vec![SimEntry::Barrier, SimEntry::System(2)],
                vec![SimEntry::Barrier],
            ],
            busy: vec![2.0, 1.0, 0.0],
            barrier_count: 1,
            makespan: 3.0,
            imbalance: 0.8,
        }
    }

    #[test]
    fn test_simulation_plan_attaches_barriers() {
        let model = ResolvedModel::resolve(&[
            SystemDescriptor::new("m1").on_main_thread(),
            SystemDescriptor::new("m2").on_main_thread(),
            SystemDescriptor::new("g"),
        ])
        .unwrap();
        let plan = materialize_simulation(&model, &outcome(), vec![]).unwrap();

        assert_eq!(plan.kind, PlanKind::Optimized);
        assert_eq!(plan.seed, Some(5));
        let m1 = plan.get("m1").unwrap();
        assert_eq!((m1.timeslot, m1.barriers_after), (0, 1));
        let m2 = plan.get("m2").unwrap();
        assert_eq!((m2.order, m2.timeslot, m2.barrier_total()), (1, 1, 0));
        let g = plan.get("g").unwrap();
        assert_eq!((g.thread_id, g.timeslot, g.barriers_before), (1, 1, 1));
        assert_eq!(g.category, SystemCategory::General);
        assert_eq!(plan.threads[2].idle_barriers, 1);
        assert_eq!(plan.threads[2].barrier_count, 1);
    }

    #[test]
    fn test_missing_barrier_marker_is_imbalanced() {
        let model = ResolvedModel::resolve(&[
            SystemDescriptor::new("m1").on_main_thread(),
            SystemDescriptor::new("m2").on_main_thread(),
            SystemDescriptor::new("g"),
        ])
        .unwrap();
        let mut broken = outcome();
        broken.threads[2].clear();
        let err = materialize_simulation(&model, &broken, vec![]).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::ImbalancedBarriers {
                context: "plan materialization",
                main: 1,
                other: 0,
            }
        ));
    }
}
