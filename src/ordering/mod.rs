//! System comparison and partial-order sorting.
//!
//! # Submodules
//!
//! - [`comparer`]: strict and weak pairwise comparison over a resolved model
//! - [`sorter`]: stable insertion sort with convergence bound and verification
//!
//! # Reference
//! Knuth (1998), "The Art of Computer Programming, Vol. 3", §5.2.1 (insertion sort)

pub mod comparer;
pub mod sorter;

pub use comparer::{check_antisymmetry, CompareMode, Comparer, SystemOrder};
pub use sorter::PartialOrderSorter;
