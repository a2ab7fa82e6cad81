//! System descriptor model.
//!
//! A system is the unit of schedulable work. Descriptors are produced by an
//! external discovery step and consumed here as plain data: component access,
//! explicit ordering against other systems, thread affinity and a relative
//! runtime cost used as the simulated execution duration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::AccessSet;

/// Which scheduling pool a system belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemCategory {
    /// Pinned to the reserved main thread (thread 0).
    Main,
    /// Freely distributable across the worker pool.
    General,
    /// Un-multithreaded per-frame work. Only sorted, never optimized.
    Frame,
}

/// A schedulable system with its declared constraints.
///
/// # Example
/// ```
/// use sys_schedule::models::{SystemDescriptor, SystemCategory};
///
/// let physics = SystemDescriptor::new("physics")
///     .reads("Velocity")
///     .writes("Position")
///     .runs_before("render")
///     .with_runtime_cost(2.5);
///
/// assert_eq!(physics.category(), SystemCategory::General);
/// assert!(physics.access().writes.contains("Position"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemDescriptor {
    /// Stable identity, used for ordering references and output.
    pub id: String,
    /// Human-readable name (defaults to empty).
    pub name: String,
    /// Component tags this system reads.
    pub reads: BTreeSet<String>,
    /// Component tags this system writes.
    pub writes: BTreeSet<String>,
    /// Ids of systems this one must run before.
    pub runs_before: BTreeSet<String>,
    /// Ids of systems this one must run after.
    pub runs_after: BTreeSet<String>,
    /// Restricts the system to the main thread.
    pub runs_on_main_thread: bool,
    /// Marks the system as per-frame, single-threaded work.
    pub runs_on_frame: bool,
    /// Relative runtime weight (simulated duration).
    pub runtime_cost: f64,
}

impl SystemDescriptor {
    /// Creates a general-pool system with unit cost and no constraints.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            runs_before: BTreeSet::new(),
            runs_after: BTreeSet::new(),
            runs_on_main_thread: false,
            runs_on_frame: false,
            runtime_cost: 1.0,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Declares a read of a component tag.
    pub fn reads(mut self, component: impl Into<String>) -> Self {
        self.reads.insert(component.into());
        self
    }

    /// Declares a write of a component tag.
    pub fn writes(mut self, component: impl Into<String>) -> Self {
        self.writes.insert(component.into());
        self
    }

    /// Declares that this system runs before `other`.
    pub fn runs_before(mut self, other: impl Into<String>) -> Self {
        self.runs_before.insert(other.into());
        self
    }

    /// Declares that this system runs after `other`.
    pub fn runs_after(mut self, other: impl Into<String>) -> Self {
        self.runs_after.insert(other.into());
        self
    }

    /// Pins the system to the main thread.
    pub fn on_main_thread(mut self) -> Self {
        self.runs_on_main_thread = true;
        self
    }

    /// Moves the system into the frame category.
    pub fn on_frame(mut self) -> Self {
        self.runs_on_frame = true;
        self
    }

    /// Sets the relative runtime cost.
    pub fn with_runtime_cost(mut self, cost: f64) -> Self {
        self.runtime_cost = cost;
        self
    }

    /// Name for diagnostics: the display name if set, otherwise the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Scheduling pool. Frame wins over main-thread.
    pub fn category(&self) -> SystemCategory {
        if self.runs_on_frame {
            SystemCategory::Frame
        } else if self.runs_on_main_thread {
            SystemCategory::Main
        } else {
            SystemCategory::General
        }
    }

    /// Returns a copy whose read set excludes every written tag.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.reads.retain(|tag| !out.writes.contains(tag));
        out
    }

    /// Component access of this system, with writes superseding reads.
    pub fn access(&self) -> AccessSet {
        AccessSet::new(self.reads.iter().cloned(), self.writes.iter().cloned())
    }
}
