//! Partial-order insertion sort.
//!
//! # Algorithm
//! Repeated insertion passes. For each item (second onward) scan backward
//! until reaching an item it must follow; among the scanned items, move it in
//! front of the earliest one it must precede. A move never places the item
//! ahead of something it must follow, so every move strictly reduces the
//! number of inverted pairs and passes converge. Because the comparer may
//! leave neighbours unordered, one pass is not enough: passes repeat until
//! nothing moves, bounded by the item count. The result is then verified
//! pairwise.
//!
//! Items that need not move keep their input order, so sorting an already
//! consistent list is the identity.
//!
//! # Complexity
//! O(n²) per pass, O(n³) worst case; O(n²) verification.

use std::cmp::Ordering;

use tracing::trace;

use super::SystemOrder;
use crate::error::{ScheduleError, ScheduleResult};

/// Stable sorter for a partial order.
#[derive(Debug, Clone, Copy)]
pub struct PartialOrderSorter<'a, O: SystemOrder> {
    order: &'a O,
}

impl<'a, O: SystemOrder> PartialOrderSorter<'a, O> {
    /// Creates a sorter over an ordering.
    pub fn new(order: &'a O) -> Self {
        Self { order }
    }

    /// Returns a sorted copy of `items`.
    pub fn sorted(&self, items: &[usize]) -> ScheduleResult<Vec<usize>> {
        let mut out = items.to_vec();
        self.sort(&mut out)?;
        Ok(out)
    }

    /// Sorts `items` in place.
    ///
    /// # Errors
    /// [`ScheduleError::UnsatisfiableSort`] when no order satisfies the
    /// comparer (e.g. a cyclic preference).
    pub fn sort(&self, items: &mut Vec<usize>) -> ScheduleResult<()> {
        let bound = items.len().max(1);
        for pass in 0..bound {
            let moves = self.pass(items);
            trace!(pass, moves, "insertion pass");
            if moves == 0 {
                break;
            }
        }
        self.verify(items)
    }

    fn pass(&self, items: &mut Vec<usize>) -> usize {
        let mut moves = 0;
        for i in 1..items.len() {
            let item = items[i];
            let mut target = None;
            for j in (0..i).rev() {
                match self.order.compare(item, items[j]) {
                    Ordering::Greater => break,
                    Ordering::Less => target = Some(j),
                    Ordering::Equal => {}
                }
            }
            if let Some(t) = target {
                items.remove(i);
                items.insert(t, item);
                moves += 1;
            }
        }
        moves
    }

    /// Checks that no pair in `items` is out of order.
    ///
    /// # Errors
    /// [`ScheduleError::UnsatisfiableSort`] naming the first pair whose
    /// later item must precede the earlier one.
    pub fn verify(&self, items: &[usize]) -> ScheduleResult<()> {
        for (i, &earlier) in items.iter().enumerate() {
            for &later in &items[i + 1..] {
                if self.order.compare(earlier, later) == Ordering::Greater
                    || self.order.compare(later, earlier) == Ordering::Less
                {
                    return Err(ScheduleError::UnsatisfiableSort {
                        first: self.order.label(later),
                        second: self.order.label(earlier),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SystemDescriptor;
    use crate::ordering::Comparer;
    use crate::resolver::ResolvedModel;

    fn ids(model: &ResolvedModel, items: &[usize]) -> Vec<String> {
        items.iter().map(|&i| model.id(i).to_string()).collect()
    }

    fn pipeline() -> ResolvedModel {
        // Declared in reverse of the data flow.
        ResolvedModel::resolve(&[
            SystemDescriptor::new("C").reads("Velocity"),
            SystemDescriptor::new("B").reads("Position").writes("Velocity"),
            SystemDescriptor::new("A").writes("Position"),
        ])
        .unwrap()
    }

    #[test]
    fn test_strict_sort_orders_writers_first() {
        let model = pipeline();
        let strict = Comparer::strict(&model);
        let sorted = PartialOrderSorter::new(&strict).sorted(&[0, 1, 2]).unwrap();
        assert_eq!(ids(&model, &sorted), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_weak_sort_keeps_unconstrained_order() {
        let model = pipeline();
        let weak = Comparer::weak(&model);
        let sorted = PartialOrderSorter::new(&weak).sorted(&[0, 1, 2]).unwrap();
        assert_eq!(ids(&model, &sorted), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_hard_order_respected() {
        let model = ResolvedModel::resolve(&[
            SystemDescriptor::new("render").runs_after("physics"),
            SystemDescriptor::new("audio"),
            SystemDescriptor::new("physics").runs_after("input"),
            SystemDescriptor::new("input"),
        ])
        .unwrap();
        let weak = Comparer::weak(&model);
        let sorter = PartialOrderSorter::new(&weak);
        let sorted = sorter.sorted(&[0, 1, 2, 3]).unwrap();
        let names = ids(&model, &sorted);
        let pos = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(pos("input") < pos("physics"));
        assert!(pos("physics") < pos("render"));
        assert!(sorter.verify(&sorted).is_ok());
    }

    #[test]
    fn test_resort_is_identity() {
        let model = ResolvedModel::resolve(&[
            SystemDescriptor::new("a").runs_before("c"),
            SystemDescriptor::new("b").writes("X"),
            SystemDescriptor::new("c").reads("X"),
            SystemDescriptor::new("d").runs_after("a"),
        ])
        .unwrap();
        let strict = Comparer::strict(&model);
        let sorter = PartialOrderSorter::new(&strict);
        let once = sorter.sorted(&[3, 2, 1, 0]).unwrap();
        let twice = sorter.sorted(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_verify_reports_offending_pair() {
        let model = ResolvedModel::resolve(&[
            SystemDescriptor::new("first").runs_before("second"),
            SystemDescriptor::new("second"),
        ])
        .unwrap();
        let weak = Comparer::weak(&model);
        let err = PartialOrderSorter::new(&weak).verify(&[1, 0]).unwrap_err();
        match err {
            ScheduleError::UnsatisfiableSort { first, second } => {
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            other => panic!("wrong error: {other}"),
        }
    }

    /// a < b, b < c, c < a.
    struct Cyclic;

    impl SystemOrder for Cyclic {
        fn compare(&self, a: usize, b: usize) -> Ordering {
            match (a, b) {
                (0, 1) | (1, 2) | (2, 0) => Ordering::Less,
                (1, 0) | (2, 1) | (0, 2) => Ordering::Greater,
                _ => Ordering::Equal,
            }
        }

        fn label(&self, idx: usize) -> String {
            format!("s{idx}")
        }
    }

    #[test]
    fn test_cyclic_order_is_unsatisfiable() {
        let err = PartialOrderSorter::new(&Cyclic).sorted(&[0, 1, 2]).unwrap_err();
        assert!(matches!(err, ScheduleError::UnsatisfiableSort { .. }));
    }

    #[test]
    fn test_empty_and_single() {
        let model = pipeline();
        let weak = Comparer::weak(&model);
        let sorter = PartialOrderSorter::new(&weak);
        assert!(sorter.sorted(&[]).unwrap().is_empty());
        assert_eq!(sorter.sorted(&[2]).unwrap(), vec![2]);
    }
}
