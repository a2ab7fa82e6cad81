//! Ahead-of-time system scheduling.
//!
//! Takes declared systems (units of per-frame work with component access and
//! ordering constraints) and produces a multi-threaded execution plan: which
//! thread runs each system, in what order, and where threads synchronize.
//! The plan respects every hard ordering, never runs write-conflicting
//! systems concurrently, and minimizes estimated makespan and load imbalance.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `SystemDescriptor`, `AccessSet`,
//!   `ExecutionPlan`, `PlannedSystem`, `ThreadPlan`
//! - **`resolver`**: Dependency resolution and transitive closure
//! - **`ordering`**: Strict/weak comparers and the partial-order sorter
//! - **`scheduler`**: Execution groups, barrier insertion, materialization,
//!   KPIs and the `Synthesizer` façade
//! - **`search`**: Randomized thread-assignment simulation and parallel search
//! - **`validation`**: Input integrity checks and plan audit
//! - **`config`**: Search tunables
//! - **`error`**: Error taxonomy
//!
//! # Architecture
//!
//! Discovery of systems and emission of source code for the plan are left to
//! callers. This crate consumes plain descriptors and returns a structured,
//! serializable plan.
//!
//! # References
//!
//! - Graham (1969), "Bounds on Multiprocessing Timing Anomalies"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Knuth (1998), "The Art of Computer Programming, Vol. 3"

pub mod config;
pub mod error;
pub mod models;
pub mod ordering;
pub mod resolver;
pub mod scheduler;
pub mod search;
pub mod validation;

pub use config::SearchConfig;
pub use error::{ScheduleError, ScheduleResult};
pub use models::{ExecutionPlan, PlannedSystem, SystemDescriptor};
pub use scheduler::{PlanKpi, Synthesizer};
