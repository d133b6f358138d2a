use std::collections::HashSet;

use crate::highlight::HighlightId;
use crate::Issue;

/// An issue awaiting the user's decision.
///
/// `slot` is the issue's index in the sorted list handed to the
/// presentation layer. It stays fixed while siblings are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub slot: usize,
    pub issue: Issue,
    pub highlight: Option<HighlightId>,
}

/// Working set of issues for the current check cycle.
#[derive(Debug, Clone, Default)]
pub struct IssueSet {
    entries: Vec<Pending>,
}

impl IssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop hidden issues, keep the first issue per explanation in the
    /// order the service sent them, then stable-sort by `begin`.
    pub fn normalize(raw: Vec<Issue>) -> Vec<Issue> {
        let mut seen = HashSet::new();
        let mut kept: Vec<Issue> = raw
            .into_iter()
            .filter(|issue| !issue.hidden)
            .filter(|issue| seen.insert(issue.explanation.clone()))
            .collect();
        kept.sort_by_key(|issue| issue.begin);
        kept
    }

    /// Replace the working set with already normalised issues, numbering
    /// slots in order.
    pub fn load(&mut self, ordered: Vec<Issue>) {
        self.entries = ordered
            .into_iter()
            .enumerate()
            .map(|(slot, issue)| Pending {
                slot,
                issue,
                highlight: None,
            })
            .collect();
    }

    /// Remove exactly the issue rendered at `slot`.
    pub fn remove(&mut self, slot: usize) -> Option<Pending> {
        let idx = self.entries.iter().position(|p| p.slot == slot)?;
        Some(self.entries.remove(idx))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, slot: usize) -> Option<&Pending> {
        self.entries.iter().find(|p| p.slot == slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pending> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pending> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Pending> {
        self.entries.clone()
    }
}
