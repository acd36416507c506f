//! Record diffs, the unit of notification and undo.

use crate::records::{Record, RecordId, RecordScope, TypeName};
use std::collections::BTreeMap;

/// Before and after value of one record within a diff.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange {
    pub before: Option<Record>,
    pub after: Option<Record>,
}

impl RecordChange {
    pub fn is_create(&self) -> bool {
        self.before.is_none() && self.after.is_some()
    }

    pub fn is_update(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    pub fn is_delete(&self) -> bool {
        self.before.is_some() && self.after.is_none()
    }

    fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// The set of record changes produced by one committed transaction.
///
/// Consecutive changes to the same id are squashed: the entry keeps the
/// value from before the first change and the value after the last one, and
/// disappears when they are equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordsDiff {
    changes: BTreeMap<RecordId, RecordChange>,
}

impl RecordsDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, id: &RecordId) -> Option<&RecordChange> {
        self.changes.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.changes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &RecordChange)> {
        self.changes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.changes.keys()
    }

    /// Record ids created by this diff.
    pub fn added(&self) -> impl Iterator<Item = &RecordId> {
        self.changes.iter().filter(|(_, c)| c.is_create()).map(|(id, _)| id)
    }

    /// Record ids removed by this diff.
    pub fn removed(&self) -> impl Iterator<Item = &RecordId> {
        self.changes.iter().filter(|(_, c)| c.is_delete()).map(|(id, _)| id)
    }

    /// Record kinds touched by this diff.
    pub fn type_names(&self) -> Vec<TypeName> {
        let mut names: Vec<TypeName> = self.changes.keys().map(RecordId::type_name).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Fold a single change into the diff.
    pub fn record(&mut self, id: RecordId, before: Option<Record>, after: Option<Record>) {
        match self.changes.get_mut(&id) {
            Some(existing) => {
                existing.after = after;
                if existing.is_noop() {
                    self.changes.remove(&id);
                }
            }
            None => {
                let change = RecordChange { before, after };
                if !change.is_noop() {
                    self.changes.insert(id, change);
                }
            }
        }
    }

    /// Fold every change of `other`, which happened after this diff.
    pub fn squash(&mut self, other: &RecordsDiff) {
        for (id, change) in &other.changes {
            self.record(id.clone(), change.before.clone(), change.after.clone());
        }
    }

    /// The diff that undoes this one.
    pub fn inverse(&self) -> RecordsDiff {
        RecordsDiff {
            changes: self
                .changes
                .iter()
                .map(|(id, change)| {
                    (
                        id.clone(),
                        RecordChange {
                            before: change.after.clone(),
                            after: change.before.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// The part of this diff touching records of `scope`.
    pub fn filter_scope(&self, scope: RecordScope) -> RecordsDiff {
        RecordsDiff {
            changes: self
                .changes
                .iter()
                .filter(|(id, _)| id.type_name().scope() == scope)
                .map(|(id, change)| (id.clone(), change.clone()))
                .collect(),
        }
    }
}
