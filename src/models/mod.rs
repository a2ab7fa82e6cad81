//! Scheduling domain models.
//!
//! Input types describe systems and their declared constraints; output
//! types describe the execution plan handed to the code emitter.
//!
//! # Domain Mappings
//!
//! | sys-schedule | ECS | Job-shop |
//! |--------------|-----|----------|
//! | SystemDescriptor | System | Operation |
//! | AccessSet | Component query | Resource claim |
//! | PlannedSystem | Scheduled system | Assignment |
//! | ExecutionPlan | Frame schedule | Production plan |

mod access;
mod plan;
mod system;

pub use access::AccessSet;
pub use plan::{ExecutionPlan, PlanKind, PlannedSystem, ThreadPlan, MAIN_THREAD};
pub use system::{SystemCategory, SystemDescriptor};
