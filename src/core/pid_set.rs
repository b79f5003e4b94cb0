//! Process id sets
//!
//! Ordered, duplicate-free collections of kit pids. Iteration (and therefore
//! every log line and failure message) is in ascending numeric order.

use crate::core::models::ProcessId;
use crate::error::PreconditionViolation;
use serde::{Deserialize, Serialize};
use std::collections::btree_set::{self, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessIdSet(BTreeSet<ProcessId>);

impl ProcessIdSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Build a set from raw pids, rejecting anything that is not a valid pid.
    pub fn from_raw<I>(raw: I) -> Result<Self, PreconditionViolation>
    where
        I: IntoIterator<Item = i64>,
    {
        raw.into_iter().map(ProcessId::new).collect()
    }

    pub fn insert(&mut self, pid: ProcessId) -> bool {
        self.0.insert(pid)
    }

    pub fn remove(&mut self, pid: ProcessId) -> bool {
        self.0.remove(&pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.0.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, ProcessId> {
        self.0.iter()
    }

    /// Members present in both sets.
    ///
    /// The reaper calls this with the current live set and the snapshot taken
    /// before killing; whatever comes back is still alive.
    pub fn intersection(&self, other: &ProcessIdSet) -> ProcessIdSet {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    pub fn union(&self, other: &ProcessIdSet) -> ProcessIdSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn is_disjoint(&self, other: &ProcessIdSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn to_raw(&self) -> Vec<i32> {
        self.0.iter().map(|pid| pid.as_raw()).collect()
    }
}

impl FromIterator<ProcessId> for ProcessIdSet {
    fn from_iter<T: IntoIterator<Item = ProcessId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ProcessId> for ProcessIdSet {
    fn extend<T: IntoIterator<Item = ProcessId>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl IntoIterator for ProcessIdSet {
    type Item = ProcessId;
    type IntoIter = btree_set::IntoIter<ProcessId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ProcessIdSet {
    type Item = &'a ProcessId;
    type IntoIter = btree_set::Iter<'a, ProcessId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// `[3, 7, 42]`, or `[]` when empty.
impl fmt::Display for ProcessIdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, pid) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", pid)?;
        }
        f.write_str("]")
    }
}
