//! Schedule synthesis façade.
//!
//! # Pipeline
//!
//! 1. Validate the configuration and resolve the declared systems.
//! 2. Self-check both comparers for antisymmetry.
//! 3. Sort each category (main, general, frame) with the strict comparer,
//!    falling back to the weak comparer when the writer-before-reader
//!    preference is cyclic.
//! 4. Either build execution groups and a two-lane plan (`plan`), or run
//!    the randomized multi-start search over all threads (`optimize`).
//! 5. Materialize and audit the plan.

use tracing::{debug, info, warn};

use super::groups::{ExecutionGroups, LaneSchedule};
use super::materialize::{materialize_lanes, materialize_simulation};
use crate::config::SearchConfig;
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{ExecutionPlan, SystemCategory, SystemDescriptor};
use crate::ordering::{check_antisymmetry, Comparer, PartialOrderSorter};
use crate::resolver::ResolvedModel;
use crate::search::{SearchReport, SearchRunner, Simulation};
use crate::validation::{audit_plan, validate_config};

/// Resolved model with each category sorted.
#[derive(Debug, Clone)]
pub struct SortedModel {
    /// The resolved model.
    pub model: ResolvedModel,
    /// Main-thread systems in execution order.
    pub main: Vec<usize>,
    /// General-pool systems in execution order.
    pub general: Vec<usize>,
    /// Frame systems in execution order.
    pub frame: Vec<usize>,
}

impl SortedModel {
    /// Frame system ids in order.
    pub fn frame_ids(&self) -> Vec<String> {
        self.frame
            .iter()
            .map(|&i| self.model.id(i).to_string())
            .collect()
    }
}

/// Static system scheduler.
///
/// `plan` is deterministic and cheap; `optimize` searches for a lower
/// makespan across all configured threads.
///
/// # Example
///
/// ```
/// use sys_schedule::config::SearchConfig;
/// use sys_schedule::models::SystemDescriptor;
/// use sys_schedule::scheduler::Synthesizer;
///
/// let systems = vec![
///     SystemDescriptor::new("input").on_main_thread().writes("Input"),
///     SystemDescriptor::new("movement").reads("Input").writes("Position"),
///     SystemDescriptor::new("render")
///         .on_main_thread()
///         .reads("Position")
///         .runs_after("movement"),
/// ];
///
/// let synthesizer = Synthesizer::new(SearchConfig::default());
/// let plan = synthesizer.plan(&systems).unwrap();
/// assert_eq!(plan.thread_order(0), vec!["input", "render"]);
/// assert_eq!(plan.thread_order(1), vec!["movement"]);
/// assert!(plan.get("render").unwrap().timeslot > plan.get("movement").unwrap().timeslot);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SearchConfig,
}

impl Synthesizer {
    /// Creates a synthesizer.
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// The search configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Resolves the systems and sorts every category.
    ///
    /// # Errors
    /// Invalid configuration or input, contradictory ordering, an
    /// inconsistent comparer, or an unsatisfiable hard order.
    pub fn prepare(&self, systems: &[SystemDescriptor]) -> ScheduleResult<SortedModel> {
        validate_config(&self.config).map_err(ScheduleError::InvalidInput)?;
        let model = ResolvedModel::resolve(systems)?;

        let all: Vec<usize> = (0..model.len()).collect();
        check_antisymmetry(&Comparer::strict(&model), &all)?;
        check_antisymmetry(&Comparer::weak(&model), &all)?;

        let main = sort_category(&model, SystemCategory::Main)?;
        let general = sort_category(&model, SystemCategory::General)?;
        let frame = sort_category(&model, SystemCategory::Frame)?;
        debug!(
            main = main.len(),
            general = general.len(),
            frame = frame.len(),
            "categories sorted"
        );

        Ok(SortedModel {
            model,
            main,
            general,
            frame,
        })
    }

    /// Builds the deterministic two-lane plan.
    ///
    /// Thread 0 runs the main sequence, thread 1 the general sequence;
    /// barriers are directed hand-offs between them.
    ///
    /// # Errors
    /// See [`Synthesizer::prepare`]; also internal barrier or audit failures.
    pub fn plan(&self, systems: &[SystemDescriptor]) -> ScheduleResult<ExecutionPlan> {
        let sorted = self.prepare(systems)?;
        let model = &sorted.model;

        let groups = ExecutionGroups::build(model, &sorted.main, &sorted.general);
        let lanes = LaneSchedule::build(model, &groups)?;
        let plan = materialize_lanes(model, &lanes, sorted.frame_ids(), self.config.barrier_cost)?;
        let plan = audited(model, plan)?;

        info!(
            systems = plan.system_count(),
            barriers = plan.barrier_count,
            makespan = plan.makespan,
            "deterministic plan ready"
        );
        Ok(plan)
    }

    /// Searches for the best plan across `worker_threads + 1` threads.
    ///
    /// # Errors
    /// See [`Synthesizer::prepare`]; [`ScheduleError::NoValidOrdering`] when
    /// no attempt completes; internal barrier or audit failures.
    pub fn optimize(&self, systems: &[SystemDescriptor]) -> ScheduleResult<ExecutionPlan> {
        self.optimize_with_report(systems).map(|(plan, _)| plan)
    }

    /// Like [`Synthesizer::optimize`], also returning search statistics.
    pub fn optimize_with_report(
        &self,
        systems: &[SystemDescriptor],
    ) -> ScheduleResult<(ExecutionPlan, SearchReport)> {
        let sorted = self.prepare(systems)?;
        let model = &sorted.model;

        let simulation = Simulation::new(
            model,
            sorted.main.clone(),
            sorted.general.clone(),
            &self.config,
        );
        let report = SearchRunner::new(&simulation, &self.config).run()?;

        let weak = Comparer::weak(model);
        let sorter = PartialOrderSorter::new(&weak);
        for thread in 0..report.best.threads.len() {
            sorter.verify(&report.best.systems_on(thread))?;
        }

        let plan = materialize_simulation(model, &report.best, sorted.frame_ids())?;
        let plan = audited(model, plan)?;

        info!(
            systems = plan.system_count(),
            threads = plan.thread_count(),
            barriers = plan.barrier_count,
            makespan = plan.makespan,
            imbalance = plan.imbalance,
            seed = report.best.seed,
            attempts = report.attempts,
            "optimized plan ready"
        );
        Ok((plan, report))
    }
}

fn sort_category(model: &ResolvedModel, category: SystemCategory) -> ScheduleResult<Vec<usize>> {
    let items = model.indices_in(category);
    let strict = Comparer::strict(model);
    match PartialOrderSorter::new(&strict).sorted(&items) {
        Err(ScheduleError::UnsatisfiableSort { first, second }) => {
            warn!(
                ?category,
                %first,
                %second,
                "writer-before-reader preference is cyclic; sorting by hard order only"
            );
            let weak = Comparer::weak(model);
            PartialOrderSorter::new(&weak).sorted(&items)
        }
        other => other,
    }
}

fn audited(model: &ResolvedModel, plan: ExecutionPlan) -> ScheduleResult<ExecutionPlan> {
    let violations = audit_plan(model, &plan);
    if violations.is_empty() {
        Ok(plan)
    } else {
        Err(ScheduleError::PlanAudit(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanKind, MAIN_THREAD};
    use crate::validation::ValidationErrorKind;

    fn sys(id: &str) -> SystemDescriptor {
        SystemDescriptor::new(id)
    }

    fn bounded() -> SearchConfig {
        SearchConfig::default()
            .with_worker_threads(2)
            .with_seed(17)
            .with_search_workers(1)
            .with_max_attempts(40)
    }

    /// Four main-thread systems, six general systems; g1 and g2 both write C.
    fn game_frame() -> Vec<SystemDescriptor> {
        vec![
            sys("m_input").on_main_thread().writes("Input"),
            sys("m_camera").on_main_thread().reads("Transform").runs_after("m_input"),
            sys("m_ui").on_main_thread().writes("Ui"),
            sys("m_audio").on_main_thread().reads("Audio").runs_after("m_ui"),
            sys("g1").writes("C"),
            sys("g2").writes("C").with_runtime_cost(2.0),
            sys("g_move").reads("Input").writes("Transform"),
            sys("g_mix").writes("Audio"),
            sys("g_read_c").reads("C"),
            sys("g_ai").writes("Ai").with_runtime_cost(3.0),
        ]
    }

    fn assert_balanced(plan: &ExecutionPlan) {
        match plan.kind {
            PlanKind::Deterministic => {
                assert_eq!(plan.barriers_before_on(0), plan.barriers_after_on(1));
                assert_eq!(plan.barriers_after_on(0), plan.barriers_before_on(1));
            }
            PlanKind::Optimized => {
                for t in &plan.threads {
                    let total = plan.barriers_before_on(t.thread_id)
                        + plan.barriers_after_on(t.thread_id)
                        + t.idle_barriers;
                    assert_eq!(total, plan.barrier_count);
                }
            }
        }
    }

    #[test]
    fn test_strict_order_on_general_lane() {
        let systems = vec![
            sys("C").reads("Velocity"),
            sys("B").reads("Position").writes("Velocity"),
            sys("A").writes("Position"),
        ];
        let plan = Synthesizer::default().plan(&systems).unwrap();
        assert_eq!(plan.thread_order(1), vec!["A", "B", "C"]);
        assert!(plan.thread_order(0).is_empty());
    }

    #[test]
    fn test_contradiction_rejected() {
        let systems = vec![sys("X").runs_before("Y"), sys("Y").runs_before("X")];
        let err = Synthesizer::default().plan(&systems).unwrap_err();
        match err {
            ScheduleError::ContradictoryOrdering { first, second } => {
                assert_eq!(first, "X");
                assert_eq!(second, "Y");
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn test_cycle_rejected_before_sorting() {
        let systems = vec![
            sys("A").runs_before("B"),
            sys("B").runs_before("C"),
            sys("C").runs_before("A"),
        ];
        let err = Synthesizer::default().optimize(&systems).unwrap_err();
        assert!(matches!(err, ScheduleError::ContradictoryOrdering { .. }));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let synth = Synthesizer::new(SearchConfig::default().with_worker_threads(0));
        let err = synth.plan(&[sys("a")]).unwrap_err();
        match err {
            ScheduleError::InvalidInput(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| e.kind == ValidationErrorKind::InvalidConfig));
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn test_cyclic_preference_falls_back_to_weak_order() {
        // a feeds b feeds c feeds a.
        let systems = vec![
            sys("a").reads("Z").writes("X"),
            sys("b").reads("X").writes("Y"),
            sys("c").reads("Y").writes("Z"),
        ];
        let synth = Synthesizer::default();
        let sorted = synth.prepare(&systems).unwrap();
        assert_eq!(sorted.general, vec![0, 1, 2]);
        let plan = synth.plan(&systems).unwrap();
        assert_eq!(plan.thread_order(1), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_frame_systems_only_in_frame_order() {
        let systems = vec![
            sys("late").on_frame().runs_after("early"),
            sys("early").on_frame(),
            sys("m").on_main_thread(),
            sys("g"),
        ];
        let plan = Synthesizer::default().plan(&systems).unwrap();
        assert_eq!(plan.frame_order, vec!["early".to_string(), "late".to_string()]);
        assert!(plan.get("late").is_none());
        assert_eq!(plan.system_count(), 2);

        let optimized = Synthesizer::new(bounded()).optimize(&systems).unwrap();
        assert_eq!(optimized.frame_order, plan.frame_order);
        assert!(optimized.get("early").is_none());
    }

    #[test]
    fn test_deterministic_plan_for_game_frame() {
        let plan = Synthesizer::new(bounded()).plan(&game_frame()).unwrap();
        assert_eq!(plan.kind, PlanKind::Deterministic);
        assert_eq!(plan.system_count(), 10);
        assert_eq!(plan.thread_order(MAIN_THREAD).len(), 4);
        assert_balanced(&plan);
        // Conflicting on Transform, so never concurrent.
        let move_sys = plan.get("g_move").unwrap();
        let camera = plan.get("m_camera").unwrap();
        assert_ne!(move_sys.timeslot, camera.timeslot);
    }

    #[test]
    fn test_shared_writers_never_share_a_timeslot_across_threads() {
        let plan = Synthesizer::new(bounded()).optimize(&game_frame()).unwrap();
        assert_eq!(plan.kind, PlanKind::Optimized);
        assert_eq!(plan.thread_count(), 3);
        assert_eq!(plan.system_count(), 10);

        let g1 = plan.get("g1").unwrap();
        let g2 = plan.get("g2").unwrap();
        assert!(g1.thread_id == g2.thread_id || g1.timeslot != g2.timeslot);

        for a in &plan.systems {
            if a.category == SystemCategory::Main {
                assert_eq!(a.thread_id, MAIN_THREAD);
            }
        }
        assert_balanced(&plan);
        assert!(plan.seed.is_some());
    }

    #[test]
    fn test_optimize_report() {
        let (plan, report) = Synthesizer::new(bounded())
            .optimize_with_report(&game_frame())
            .unwrap();
        assert_eq!(report.attempts, 40);
        assert_eq!(plan.seed, Some(report.best.seed));
        assert!((plan.makespan - report.best.makespan).abs() < 1e-9);
        // Total cost 13 over three threads.
        assert!(plan.makespan >= 13.0 / 3.0);
    }

    #[test]
    fn test_optimize_with_zero_patience() {
        let systems = vec![SystemDescriptor::new("a"), SystemDescriptor::new("b")];
        let config = SearchConfig::default()
            .with_search_workers(1)
            .with_patience(std::time::Duration::ZERO);
        let plan = Synthesizer::new(config).optimize(&systems).unwrap();
        assert_eq!(plan.system_count(), 2);
        assert_balanced(&plan);
    }

    #[test]
    fn test_empty_input() {
        let plan = Synthesizer::default().plan(&[]).unwrap();
        assert_eq!(plan.system_count(), 0);
        assert_eq!(plan.barrier_count, 0);
        let optimized = Synthesizer::new(bounded()).optimize(&[]).unwrap();
        assert_eq!(optimized.system_count(), 0);
    }

    #[test]
    fn test_plan_serializes() {
        let plan = Synthesizer::new(bounded()).optimize(&game_frame()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        let back: ExecutionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.systems, plan.systems);
        assert_eq!(back.kind, PlanKind::Optimized);
        assert_eq!(back.seed, plan.seed);
        assert!(json.contains("\"timeslot\""));
    }
}
