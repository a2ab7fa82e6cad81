//! Randomized thread-assignment search.
//!
//! # Submodules
//!
//! - [`simulation`]: one seeded attempt at interleaving the main sequence and
//!   the general pool across threads
//! - [`runner`]: multi-start parallel search keeping the best attempt
//!
//! # Selection
//! Lower makespan wins; ties are broken by lower per-thread imbalance.

pub mod runner;
pub mod simulation;

pub use runner::{SearchReport, SearchRunner};
pub use simulation::{SimEntry, Simulation, SimulationOutcome};
