//! Input validation and plan auditing.
//!
//! Two checkpoints bracket every scheduling run:
//!
//! - [`validate_input`] checks the structural integrity of the system list
//!   before dependency resolution: duplicate ids, dangling or self
//!   references, unusable runtime costs.
//! - [`audit_plan`] checks a finished [`ExecutionPlan`] against the resolved
//!   model: every system placed exactly once, thread affinity, hard ordering,
//!   no write conflicts within a timeslot, barrier balance.
//!
//! Both collect every problem instead of stopping at the first.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::config::SearchConfig;
use crate::models::{ExecutionPlan, PlanKind, PlannedSystem, SystemCategory, SystemDescriptor};
use crate::resolver::ResolvedModel;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two systems share the same id.
    DuplicateId,
    /// A system has an empty id.
    EmptyId,
    /// An ordering references a system that doesn't exist.
    UnknownReference,
    /// A system is ordered against itself.
    SelfReference,
    /// Runtime cost is zero, negative, or not finite.
    InvalidRuntimeCost,
    /// Search configuration cannot produce a plan.
    InvalidConfig,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a system list before resolution.
///
/// Checks:
/// 1. No empty ids
/// 2. No duplicate ids
/// 3. Positive, finite runtime costs
/// 4. All before/after references point to existing systems
/// 5. No system ordered against itself
///
/// Contradictions and cycles are left to the resolver.
pub fn validate_input(systems: &[SystemDescriptor]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for s in systems {
        if s.id.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyId,
                "System with empty ID",
            ));
        }
        if !ids.insert(s.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate system ID: {}", s.id),
            ));
        }
        if !(s.runtime_cost.is_finite() && s.runtime_cost > 0.0) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidRuntimeCost,
                format!("System '{}' has invalid runtime cost {}", s.id, s.runtime_cost),
            ));
        }
    }

    for s in systems {
        for (relation, targets) in [("before", &s.runs_before), ("after", &s.runs_after)] {
            for target in targets {
                if target == &s.id {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::SelfReference,
                        format!("System '{}' is ordered {relation} itself", s.id),
                    ));
                } else if !ids.contains(target.as_str()) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownReference,
                        format!(
                            "System '{}' runs {relation} unknown system '{target}'",
                            s.id
                        ),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a search configuration.
pub fn validate_config(config: &SearchConfig) -> ValidationResult {
    let mut errors = Vec::new();
    if config.worker_threads == 0 {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidConfig,
            "worker_threads must be at least 1",
        ));
    }
    if !(config.barrier_cost.is_finite() && config.barrier_cost >= 0.0) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidConfig,
            "barrier_cost must be finite and non-negative",
        ));
    }
    if !(0.0..=1.0).contains(&config.main_preference) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidConfig,
            "main_preference must lie in 0..=1",
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A defect found in a finished plan.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PlanViolation {
    /// Type of violation.
    pub violation_type: PlanViolationType,
    /// Related system id (or thread label).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
}

/// Classification of plan defects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanViolationType {
    /// A resolved system is absent from the plan.
    MissingSystem,
    /// A system is placed more than once.
    DuplicateSystem,
    /// The plan names a system the model doesn't know.
    UnknownSystem,
    /// A main-thread system is off thread 0, or a frame system is threaded.
    ThreadAffinity,
    /// Two entries share a thread position.
    DuplicatePosition,
    /// A must-run-before pair is not guaranteed to execute in order.
    OrderingViolated,
    /// Write-conflicting systems share a timeslot on different threads.
    ConcurrentConflict,
    /// Barrier totals don't pair up across threads.
    ImbalancedBarriers,
}

impl PlanViolation {
    fn new(
        violation_type: PlanViolationType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }
}

/// Audits a plan against the resolved model.
///
/// Returns every violation found; an empty list means the plan is sound.
pub fn audit_plan(model: &ResolvedModel, plan: &ExecutionPlan) -> Vec<PlanViolation> {
    let mut violations = Vec::new();
    let mut placed: HashMap<usize, &PlannedSystem> = HashMap::new();
    let mut positions: HashSet<(usize, usize)> = HashSet::new();

    for entry in &plan.systems {
        let Some(idx) = model.index_of(&entry.system_id) else {
            violations.push(PlanViolation::new(
                PlanViolationType::UnknownSystem,
                &entry.system_id,
                format!("Plan names unknown system '{}'", entry.system_id),
            ));
            continue;
        };
        if placed.insert(idx, entry).is_some() {
            violations.push(PlanViolation::new(
                PlanViolationType::DuplicateSystem,
                &entry.system_id,
                format!("System '{}' placed more than once", entry.system_id),
            ));
        }
        if !positions.insert((entry.thread_id, entry.order)) {
            violations.push(PlanViolation::new(
                PlanViolationType::DuplicatePosition,
                &entry.system_id,
                format!(
                    "Position {} on thread {} is taken twice",
                    entry.order, entry.thread_id
                ),
            ));
        }
        match model.category(idx) {
            SystemCategory::Main if entry.thread_id != 0 => {
                violations.push(PlanViolation::new(
                    PlanViolationType::ThreadAffinity,
                    &entry.system_id,
                    format!(
                        "Main-thread system '{}' placed on thread {}",
                        entry.system_id, entry.thread_id
                    ),
                ));
            }
            SystemCategory::Frame => {
                violations.push(PlanViolation::new(
                    PlanViolationType::ThreadAffinity,
                    &entry.system_id,
                    format!("Frame system '{}' placed on a thread", entry.system_id),
                ));
            }
            _ => {}
        }
    }

    for idx in 0..model.len() {
        let present = match model.category(idx) {
            SystemCategory::Frame => plan.frame_order.iter().any(|id| id == model.id(idx)),
            _ => placed.contains_key(&idx),
        };
        if !present {
            violations.push(PlanViolation::new(
                PlanViolationType::MissingSystem,
                model.id(idx),
                format!("System '{}' is missing from the plan", model.id(idx)),
            ));
        }
    }

    let mut entries: Vec<(usize, &PlannedSystem)> = placed.into_iter().collect();
    entries.sort_by_key(|(idx, _)| *idx);

    for (i, &(a, pa)) in entries.iter().enumerate() {
        for &(b, pb) in &entries[i + 1..] {
            let (first, second, pf, ps) = if model.must_run_before(a, b) {
                (a, b, pa, pb)
            } else if model.must_run_before(b, a) {
                (b, a, pb, pa)
            } else {
                if pa.thread_id != pb.thread_id
                    && pa.timeslot == pb.timeslot
                    && model.conflicts(a, b)
                {
                    violations.push(PlanViolation::new(
                        PlanViolationType::ConcurrentConflict,
                        model.id(a),
                        format!(
                            "'{}' and '{}' conflict but share timeslot {}",
                            model.id(a),
                            model.id(b),
                            pa.timeslot
                        ),
                    ));
                }
                continue;
            };
            let in_order = if pf.thread_id == ps.thread_id {
                pf.order < ps.order
            } else {
                pf.timeslot < ps.timeslot
            };
            if !in_order {
                violations.push(PlanViolation::new(
                    PlanViolationType::OrderingViolated,
                    model.id(first),
                    format!(
                        "'{}' must run before '{}'",
                        model.id(first),
                        model.id(second)
                    ),
                ));
            }
        }
    }

    violations.extend(audit_barriers(plan));
    violations
}

/// Checks that barrier counts pair up across threads.
///
/// Deterministic plans pair directed hand-offs between thread 0 and
/// thread 1. Optimized plans require every thread to take part in every
/// barrier.
pub fn audit_barriers(plan: &ExecutionPlan) -> Vec<PlanViolation> {
    let mut violations = Vec::new();
    match plan.kind {
        PlanKind::Deterministic => {
            let pairs = [
                (plan.barriers_before_on(0), plan.barriers_after_on(1), "main waits"),
                (plan.barriers_after_on(0), plan.barriers_before_on(1), "worker waits"),
            ];
            for (main, other, label) in pairs {
                if main != other {
                    violations.push(PlanViolation::new(
                        PlanViolationType::ImbalancedBarriers,
                        label,
                        format!("{label}: main side {main}, worker side {other}"),
                    ));
                }
            }
        }
        PlanKind::Optimized => {
            for thread in &plan.threads {
                let attached = plan.barriers_before_on(thread.thread_id)
                    + plan.barriers_after_on(thread.thread_id)
                    + thread.idle_barriers;
                if attached != plan.barrier_count || thread.barrier_count != plan.barrier_count {
                    violations.push(PlanViolation::new(
                        PlanViolationType::ImbalancedBarriers,
                        format!("thread {}", thread.thread_id),
                        format!(
                            "thread {} carries {attached} barriers, plan has {}",
                            thread.thread_id, plan.barrier_count
                        ),
                    ));
                }
            }
        }
    }
    violations
}
