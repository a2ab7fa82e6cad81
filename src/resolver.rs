//! Dependency resolution.
//!
//! Turns the before/after declarations of every system into a transitively
//! closed strict partial order and rejects contradictory input.
//!
//! # Algorithm
//! 1. Mirror each declared edge (A before B ⇒ B after A).
//! 2. Reject systems declared both before and after the same system.
//! 3. For every system, walk its "after" closure with an explicit worklist.
//!    Reaching a system it is declared to run before is a contradiction
//!    (this covers cycles).
//! 4. Store both closures so "must A run before B" is a set lookup.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22 (graph search)

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, info, warn};

use crate::error::{ScheduleError, ScheduleResult};
use crate::models::{AccessSet, SystemCategory, SystemDescriptor};
use crate::validation::{validate_input, ValidationError, ValidationErrorKind};

/// Systems with a resolved, transitively closed ordering relation.
///
/// Systems are addressed by their index in discovery order.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    systems: Vec<SystemDescriptor>,
    access: Vec<AccessSet>,
    index: HashMap<String, usize>,
    /// `before[i]`: systems that `i` must run before.
    before: Vec<HashSet<usize>>,
    /// `after[i]`: systems that `i` must run after.
    after: Vec<HashSet<usize>>,
}

impl ResolvedModel {
    /// Validates and resolves a list of system descriptors.
    ///
    /// # Errors
    /// - [`ScheduleError::InvalidInput`] for structural problems
    ///   (duplicate ids, unknown references, bad costs).
    /// - [`ScheduleError::ContradictoryOrdering`] when a system is required,
    ///   directly or transitively, both before and after another.
    pub fn resolve(systems: &[SystemDescriptor]) -> ScheduleResult<Self> {
        validate_input(systems).map_err(ScheduleError::InvalidInput)?;

        for s in systems {
            if s.runs_on_frame && s.runs_on_main_thread {
                warn!(system = %s.id, "system flagged for both frame and main thread; frame wins");
            }
        }

        let systems: Vec<SystemDescriptor> = systems.iter().map(|s| s.normalized()).collect();
        let access = systems.iter().map(|s| s.access()).collect();
        let index: HashMap<String, usize> = systems
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let n = systems.len();
        let mut before_direct: Vec<HashSet<usize>> = vec![HashSet::new(); n];
        let mut after_direct: Vec<HashSet<usize>> = vec![HashSet::new(); n];

        for (i, s) in systems.iter().enumerate() {
            for other in &s.runs_before {
                let j = lookup(&index, other)?;
                before_direct[i].insert(j);
                after_direct[j].insert(i);
            }
            for other in &s.runs_after {
                let j = lookup(&index, other)?;
                after_direct[i].insert(j);
                before_direct[j].insert(i);
            }
        }

        let mut model = Self {
            systems,
            access,
            index,
            before: vec![HashSet::new(); n],
            after: vec![HashSet::new(); n],
        };

        model.check_direct_contradictions(&before_direct, &after_direct)?;

        for i in 0..n {
            let closure = model.walk_after_closure(i, &before_direct, &after_direct)?;
            model.after[i] = closure;
        }
        for i in 0..n {
            let after_i: Vec<usize> = model.after[i].iter().copied().collect();
            for j in after_i {
                model.before[j].insert(i);
            }
        }

        let edges: usize = model.before.iter().map(|b| b.len()).sum();
        info!(systems = n, closed_edges = edges, "dependency resolution complete");
        Ok(model)
    }

    fn check_direct_contradictions(
        &self,
        before_direct: &[HashSet<usize>],
        after_direct: &[HashSet<usize>],
    ) -> ScheduleResult<()> {
        for i in 0..self.systems.len() {
            let mut both: Vec<usize> = before_direct[i]
                .intersection(&after_direct[i])
                .copied()
                .collect();
            both.sort_unstable();
            if let Some(&j) = both.first() {
                return Err(self.contradiction(i, j));
            }
        }
        Ok(())
    }

    /// Worklist walk of everything `start` must run after.
    fn walk_after_closure(
        &self,
        start: usize,
        before_direct: &[HashSet<usize>],
        after_direct: &[HashSet<usize>],
    ) -> ScheduleResult<HashSet<usize>> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut seeds: Vec<usize> = after_direct[start].iter().copied().collect();
        seeds.sort_unstable();
        let mut queue = VecDeque::from(seeds);

        while let Some(node) = queue.pop_front() {
            if node == start || before_direct[start].contains(&node) {
                return Err(self.contradiction(start, node));
            }
            if !visited.insert(node) {
                continue;
            }
            let mut next: Vec<usize> = after_direct[node]
                .iter()
                .copied()
                .filter(|n| !visited.contains(n))
                .collect();
            next.sort_unstable();
            queue.extend(next);
        }

        debug!(system = %self.systems[start].id, after = visited.len(), "closure");
        Ok(visited)
    }

    fn contradiction(&self, a: usize, b: usize) -> ScheduleError {
        ScheduleError::ContradictoryOrdering {
            first: self.systems[a].id.clone(),
            second: self.systems[b].id.clone(),
        }
    }

    /// Number of systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether the model is empty.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// All systems in discovery order (normalized).
    pub fn systems(&self) -> &[SystemDescriptor] {
        &self.systems
    }

    /// Id of the system at `idx`.
    pub fn id(&self, idx: usize) -> &str {
        &self.systems[idx].id
    }

    /// Component access of the system at `idx`.
    pub fn access(&self, idx: usize) -> &AccessSet {
        &self.access[idx]
    }

    /// Runtime cost of the system at `idx`.
    pub fn cost(&self, idx: usize) -> f64 {
        self.systems[idx].runtime_cost
    }

    /// Category of the system at `idx`.
    pub fn category(&self, idx: usize) -> SystemCategory {
        self.systems[idx].category()
    }

    /// Index of a system id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether `a` is required (directly or transitively) to run before `b`.
    #[inline]
    pub fn must_run_before(&self, a: usize, b: usize) -> bool {
        self.before[a].contains(&b)
    }

    /// Whether `a` is required (directly or transitively) to run after `b`.
    #[inline]
    pub fn must_run_after(&self, a: usize, b: usize) -> bool {
        self.after[a].contains(&b)
    }

    /// Whether any hard ordering relates `a` and `b`.
    #[inline]
    pub fn is_ordered(&self, a: usize, b: usize) -> bool {
        self.must_run_before(a, b) || self.must_run_after(a, b)
    }

    /// Closure of systems `idx` must run before.
    pub fn before_closure(&self, idx: usize) -> &HashSet<usize> {
        &self.before[idx]
    }

    /// Closure of systems `idx` must run after.
    pub fn after_closure(&self, idx: usize) -> &HashSet<usize> {
        &self.after[idx]
    }

    /// Indices of one category, in discovery order.
    pub fn indices_in(&self, category: SystemCategory) -> Vec<usize> {
        (0..self.systems.len())
            .filter(|&i| self.category(i) == category)
            .collect()
    }

    /// Whether two systems may not share a barrier-free window on different threads.
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        self.access[a].conflicts_with(&self.access[b])
    }
}

fn lookup(index: &HashMap<String, usize>, id: &str) -> ScheduleResult<usize> {
    index
        .get(id)
        .copied()
        .ok_or_else(|| {
            ScheduleError::InvalidInput(vec![ValidationError::new(
                ValidationErrorKind::UnknownReference,
                format!("Unknown system '{id}'"),
            )])
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sys(id: &str) -> SystemDescriptor {
        SystemDescriptor::new(id)
    }

    #[test]
    fn test_mirrored_edges() {
        let model = ResolvedModel::resolve(&[sys("A").runs_before("B"), sys("B")]).unwrap();
        let a = model.index_of("A").unwrap();
        let b = model.index_of("B").unwrap();
        assert!(model.must_run_before(a, b));
        assert!(model.must_run_after(b, a));
        assert!(!model.must_run_before(b, a));
        assert!(model.is_ordered(a, b));
    }

    #[test]
    fn test_transitive_closure() {
        // A before B, C after B.
        let model = ResolvedModel::resolve(&[
            sys("A").runs_before("B"),
            sys("B"),
            sys("C").runs_after("B"),
        ])
        .unwrap();
        let (a, c) = (model.index_of("A").unwrap(), model.index_of("C").unwrap());
        assert!(model.before_closure(a).contains(&c));
        assert!(model.after_closure(c).contains(&a));
        assert_eq!(model.after_closure(c).len(), 2);
    }

    #[test]
    fn test_direct_contradiction() {
        let err = ResolvedModel::resolve(&[sys("X").runs_before("Y"), sys("Y").runs_before("X")])
            .unwrap_err();
        match err {
            ScheduleError::ContradictoryOrdering { first, second } => {
                assert_eq!(first, "X");
                assert_eq!(second, "Y");
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn test_cycle_rejected() {
        let err = ResolvedModel::resolve(&[
            sys("A").runs_before("B"),
            sys("B").runs_before("C"),
            sys("C").runs_before("A"),
        ])
        .unwrap_err();
        assert!(matches!(err, ScheduleError::ContradictoryOrdering { .. }));
    }

    #[test]
    fn test_indirect_contradiction_via_after() {
        // A after C transitively through B, but declared before C.
        let err = ResolvedModel::resolve(&[
            sys("A").runs_after("B").runs_before("C"),
            sys("B").runs_after("C"),
            sys("C"),
        ])
        .unwrap_err();
        assert!(matches!(err, ScheduleError::ContradictoryOrdering { .. }));
    }

    #[test]
    fn test_unknown_reference_is_invalid_input() {
        let err = ResolvedModel::resolve(&[sys("A").runs_before("ghost")]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInput(_)));
    }

    #[test]
    fn test_normalized_access_and_categories() {
        let model = ResolvedModel::resolve(&[
            sys("m").on_main_thread().reads("Pos").writes("Pos"),
            sys("g"),
            sys("f").on_frame(),
        ])
        .unwrap();
        assert!(model.access(0).reads.is_empty());
        assert_eq!(model.indices_in(SystemCategory::Main), vec![0]);
        assert_eq!(model.indices_in(SystemCategory::General), vec![1]);
        assert_eq!(model.indices_in(SystemCategory::Frame), vec![2]);
    }

    #[test]
    fn test_diamond_is_not_a_contradiction() {
        let model = ResolvedModel::resolve(&[
            sys("top").runs_before("left").runs_before("right"),
            sys("left").runs_before("bottom"),
            sys("right").runs_before("bottom"),
            sys("bottom"),
        ])
        .unwrap();
        let top = model.index_of("top").unwrap();
        let bottom = model.index_of("bottom").unwrap();
        assert!(model.must_run_before(top, bottom));
        assert_eq!(model.before_closure(top).len(), 3);
    }

    #[test]
    fn test_lookup_of_missing_id_is_invalid_input() {
        let index: HashMap<String, usize> = [("A".to_string(), 0)].into_iter().collect();
        assert_eq!(lookup(&index, "A").unwrap(), 0);
        match lookup(&index, "ghost").unwrap_err() {
            ScheduleError::InvalidInput(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].kind, ValidationErrorKind::UnknownReference);
                assert!(errors[0].message.contains("ghost"));
            }
            other => panic!("wrong error: {other}"),
        }
    }

    #[test]
    fn test_empty_model() {
        let model = ResolvedModel::resolve(&[]).unwrap();
        assert!(model.is_empty());
    }
}
