//! Scheduling error types.
//!
//! Every error is fatal for the run that produced it. The one exception is
//! [`ScheduleError::SchedulingStuck`], which only aborts a single simulation
//! attempt; the search surfaces [`ScheduleError::NoValidOrdering`] when no
//! attempt ever completes.

use thiserror::Error;

use crate::validation::{PlanViolation, ValidationError};

/// Errors raised while resolving, sorting or planning systems.
#[derive(Debug, Clone, Error)]
pub enum ScheduleError {
    #[error("invalid input: {}", join(.0))]
    InvalidInput(Vec<ValidationError>),

    #[error("contradictory ordering: '{first}' is required both before and after '{second}'")]
    ContradictoryOrdering { first: String, second: String },

    #[error("unsatisfiable sort: cannot place '{first}' before '{second}'")]
    UnsatisfiableSort { first: String, second: String },

    #[error("scheduling stuck in attempt with seed {seed}: {pending} systems left unassigned")]
    SchedulingStuck { seed: u64, pending: usize },

    #[error("no valid ordering found after {attempts} attempts")]
    NoValidOrdering { attempts: u64 },

    #[error("imbalanced barriers after {context}: main side {main}, other side {other}")]
    ImbalancedBarriers {
        context: &'static str,
        main: usize,
        other: usize,
    },

    #[error("inconsistent comparer: '{first}' and '{second}' do not compare antisymmetrically")]
    InconsistentComparer { first: String, second: String },

    #[error("plan audit failed: {}", join(.0))]
    PlanAudit(Vec<PlanViolation>),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_contradiction_message_names_both_systems() {
        let e = ScheduleError::ContradictoryOrdering {
            first: "X".into(),
            second: "Y".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'X'"));
        assert!(msg.contains("'Y'"));
    }

    #[test]
    fn test_invalid_input_lists_every_error() {
        let e = ScheduleError::InvalidInput(vec![
            ValidationError::new(ValidationErrorKind::DuplicateId, "Duplicate system ID: a"),
            ValidationError::new(ValidationErrorKind::UnknownReference, "unknown 'b'"),
        ]);
        let msg = e.to_string();
        assert!(msg.contains("Duplicate system ID: a"));
        assert!(msg.contains("unknown 'b'"));
    }
}
