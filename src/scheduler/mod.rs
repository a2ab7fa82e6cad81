//! Plan construction and KPI evaluation.
//!
//! # Algorithm
//!
//! `Synthesizer::plan` sorts each category, groups main-thread systems by
//! priority level, assigns general systems to groups and inserts directed
//! barriers between a main lane and a general lane.
//!
//! `Synthesizer::optimize` hands the sorted sequences to the randomized
//! search in [`crate::search`] and materializes the best simulated run.
//!
//! # KPI
//!
//! `PlanKpi` computes makespan, imbalance, barrier count and utilization.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Graham (1969), "Bounds on Multiprocessing Timing Anomalies"

mod groups;
mod kpi;
mod materialize;
mod planner;

pub use groups::{BarrierCount, ExecutionGroup, ExecutionGroups, LaneSchedule};
pub use kpi::PlanKpi;
pub(crate) use kpi::std_dev;
pub use materialize::{materialize_lanes, materialize_simulation};
pub use planner::{SortedModel, Synthesizer};
