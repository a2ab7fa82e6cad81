//! Component access sets and conflict detection.
//!
//! Two accesses conflict when one writes a component the other reads or
//! writes. Concurrent readers never conflict.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Read/write component tags of one system, or the union over several.
///
/// Writes supersede reads: a tag is never present in both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessSet {
    /// Components read but not written.
    pub reads: BTreeSet<String>,
    /// Components written.
    pub writes: BTreeSet<String>,
}

impl AccessSet {
    /// Creates an access set, dropping reads of written tags.
    pub fn new<R, W>(reads: R, writes: W) -> Self
    where
        R: IntoIterator<Item = String>,
        W: IntoIterator<Item = String>,
    {
        let writes: BTreeSet<String> = writes.into_iter().collect();
        let reads = reads.into_iter().filter(|r| !writes.contains(r)).collect();
        Self { reads, writes }
    }

    /// Whether nothing is accessed.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Whether `self` and `other` cannot run concurrently.
    ///
    /// Conflicts if (W ∩ W) or (W ∩ R) or (R ∩ W) is non-empty.
    pub fn conflicts_with(&self, other: &AccessSet) -> bool {
        self.writes
            .iter()
            .any(|w| other.writes.contains(w) || other.reads.contains(w))
            || self.reads.iter().any(|r| other.writes.contains(r))
    }

    /// Whether `self` writes a tag that `other` only reads.
    pub fn feeds(&self, other: &AccessSet) -> bool {
        self.writes.iter().any(|w| other.reads.contains(w))
    }

    /// Folds `other` into this set, keeping the write-supersedes-read rule.
    pub fn merge(&mut self, other: &AccessSet) {
        for w in &other.writes {
            self.reads.remove(w);
            self.writes.insert(w.clone());
        }
        for r in &other.reads {
            if !self.writes.contains(r) {
                self.reads.insert(r.clone());
            }
        }
    }

    /// Removes everything.
    pub fn clear(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(reads: &[&str], writes: &[&str]) -> AccessSet {
        AccessSet::new(
            reads.iter().map(|s| s.to_string()),
            writes.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn test_write_supersedes_read() {
        let a = access(&["A", "B"], &["A"]);
        assert!(a.writes.contains("A"));
        assert!(!a.reads.contains("A"));
        assert!(a.reads.contains("B"));
    }

    #[test]
    fn test_conflicts() {
        let writer = access(&[], &["Pos"]);
        let reader = access(&["Pos"], &[]);
        let other_reader = access(&["Pos"], &[]);
        let unrelated = access(&["Vel"], &["Mass"]);

        assert!(writer.conflicts_with(&reader));
        assert!(reader.conflicts_with(&writer));
        assert!(writer.conflicts_with(&writer.clone()));
        assert!(!reader.conflicts_with(&other_reader));
        assert!(!writer.conflicts_with(&unrelated));
    }

    #[test]
    fn test_feeds() {
        let writer = access(&[], &["Pos"]);
        let reader = access(&["Pos"], &[]);
        assert!(writer.feeds(&reader));
        assert!(!reader.feeds(&writer));
        // Writer-writer is a conflict, not a feed.
        assert!(!writer.feeds(&writer.clone()));
    }

    #[test]
    fn test_merge() {
        let mut window = access(&["Pos"], &[]);
        window.merge(&access(&["Vel"], &["Pos"]));
        assert!(window.writes.contains("Pos"));
        assert!(!window.reads.contains("Pos"));
        assert!(window.reads.contains("Vel"));

        window.merge(&access(&["Pos"], &[]));
        assert!(!window.reads.contains("Pos"));

        window.clear();
        assert!(window.is_empty());
    }
}
