//! Pairwise system comparison.
//!
//! Two comparers share one contract: `Less` means the first system must (or
//! should) run before the second, `Greater` the reverse, `Equal` means no
//! preference.
//!
//! - **Weak** honours only the resolved before/after relation.
//! - **Strict** adds a writer-before-reader preference for otherwise
//!   unordered pairs: a system writing a component the other only reads is
//!   placed first. When both sides feed each other the preference cancels.

use std::cmp::Ordering;

use crate::error::{ScheduleError, ScheduleResult};
use crate::resolver::ResolvedModel;

/// An ordering over system indices used by the sorter.
pub trait SystemOrder {
    /// Compares two systems. `Less` = `a` runs before `b`.
    fn compare(&self, a: usize, b: usize) -> Ordering;

    /// Label used in error messages.
    fn label(&self, idx: usize) -> String;
}

/// Which rules a [`Comparer`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Hard ordering plus writer-before-reader preference.
    Strict,
    /// Hard ordering only.
    Weak,
}

/// Comparer over a resolved model.
#[derive(Debug, Clone, Copy)]
pub struct Comparer<'a> {
    model: &'a ResolvedModel,
    mode: CompareMode,
}

impl<'a> Comparer<'a> {
    /// Creates a comparer with the given mode.
    pub fn new(model: &'a ResolvedModel, mode: CompareMode) -> Self {
        Self { model, mode }
    }

    /// Hard ordering plus writer-before-reader preference.
    pub fn strict(model: &'a ResolvedModel) -> Self {
        Self::new(model, CompareMode::Strict)
    }

    /// Hard ordering only.
    pub fn weak(model: &'a ResolvedModel) -> Self {
        Self::new(model, CompareMode::Weak)
    }

    fn hard(&self, a: usize, b: usize) -> Ordering {
        if self.model.must_run_before(a, b) {
            Ordering::Less
        } else if self.model.must_run_after(a, b) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    fn preference(&self, a: usize, b: usize) -> Ordering {
        let forward = self.model.access(a).feeds(self.model.access(b));
        let backward = self.model.access(b).feeds(self.model.access(a));
        match (forward, backward) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }
    }
}

impl SystemOrder for Comparer<'_> {
    fn compare(&self, a: usize, b: usize) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match (self.hard(a, b), self.mode) {
            (Ordering::Equal, CompareMode::Strict) => self.preference(a, b),
            (ord, _) => ord,
        }
    }

    fn label(&self, idx: usize) -> String {
        self.model.id(idx).to_string()
    }
}

/// Checks `compare(a, b) == compare(b, a).reverse()` for every pair.
///
/// # Errors
/// [`ScheduleError::InconsistentComparer`] naming the first offending pair.
pub fn check_antisymmetry<O: SystemOrder>(order: &O, items: &[usize]) -> ScheduleResult<()> {
    for (i, &a) in items.iter().enumerate() {
        for &b in &items[i + 1..] {
            if order.compare(a, b) != order.compare(b, a).reverse() {
                return Err(ScheduleError::InconsistentComparer {
                    first: order.label(a),
                    second: order.label(b),
                });
            }
        }
    }
    Ok(())
}
