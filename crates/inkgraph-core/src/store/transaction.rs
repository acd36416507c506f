//! Transactions: scoped, atomic batches of store mutations.

use super::diff::RecordsDiff;
use super::side_effects::{AfterChange, ChangeSource, Decision, HandlerId, Operation, SideEffects};
use super::view::RecordView;
use crate::error::{EditorError, Result};
use crate::records::{
    BindingId, BindingRecord, InstanceId, InstanceRecord, Record, RecordId, ShapeId, ShapeRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Whether a committed transaction lands on the undo stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    #[default]
    Record,
    Ignore,
}

/// Per-call transaction settings.
///
/// Only the outermost transaction's `history` counts; nested calls inherit
/// it. `ignore_shape_lock` applies to the scope it is set on and everything
/// nested inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionConfig {
    pub history: HistoryMode,
    pub ignore_shape_lock: bool,
}

impl TransactionConfig {
    pub fn ignore_history() -> Self {
        Self {
            history: HistoryMode::Ignore,
            ignore_shape_lock: false,
        }
    }

    pub fn ignoring_shape_lock(mut self) -> Self {
        self.ignore_shape_lock = true;
        self
    }
}

/// An open transaction.
///
/// Mutations are applied to the in-memory records immediately, so reads
/// through the transaction see them; they become visible to other readers
/// only when the outermost transaction commits, and are reverted if it
/// fails.
pub struct Transaction<'a> {
    records: &'a mut HashMap<RecordId, Record>,
    effects: Arc<SideEffects>,
    max_cascade_depth: usize,
    source: ChangeSource,
    history: HistoryMode,
    ignore_shape_lock: bool,
    side_effects: bool,
    pending: RecordsDiff,
    removed: HashSet<RecordId>,
    cascade: Vec<(HandlerId, RecordId)>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        records: &'a mut HashMap<RecordId, Record>,
        effects: Arc<SideEffects>,
        max_cascade_depth: usize,
        config: TransactionConfig,
        source: ChangeSource,
        side_effects: bool,
    ) -> Self {
        Self {
            records,
            effects,
            max_cascade_depth,
            source,
            history: config.history,
            ignore_shape_lock: config.ignore_shape_lock,
            side_effects,
            pending: RecordsDiff::new(),
            removed: HashSet::new(),
            cascade: Vec::new(),
        }
    }

    pub fn source(&self) -> ChangeSource {
        self.source
    }

    pub fn history(&self) -> HistoryMode {
        self.history
    }

    /// Changes accumulated so far.
    pub fn pending(&self) -> &RecordsDiff {
        &self.pending
    }

    pub fn view(&self) -> RecordView<'_> {
        RecordView::new(self.records)
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn shape(&self, id: &ShapeId) -> Option<&ShapeRecord> {
        self.get(&id.into()).and_then(Record::as_shape)
    }

    pub fn binding(&self, id: &BindingId) -> Option<&BindingRecord> {
        self.get(&id.into()).and_then(Record::as_binding)
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&InstanceRecord> {
        self.get(&id.into()).and_then(Record::as_instance)
    }

    /// Run `f` as a nested transaction. Its changes merge into this one; if
    /// it fails, only its own changes are rolled back.
    pub fn run<T>(&mut self, config: TransactionConfig, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let previous = self.ignore_shape_lock;
        self.ignore_shape_lock |= config.ignore_shape_lock;
        let savepoint = self.pending.clone();
        let removed = self.removed.clone();
        let result = f(self);
        self.ignore_shape_lock = previous;
        if let Err(err) = &result {
            log::debug!("nested transaction rolled back: {err}");
            self.rollback_to(savepoint);
            self.removed = removed;
        }
        result
    }

    /// Create a record. Fails if the id is taken. Returns `None` when a
    /// before-handler rejected it.
    pub fn create(&mut self, record: impl Into<Record>) -> Result<Option<Record>> {
        let record = record.into();
        let id = record.id();
        if self.records.contains_key(&id) {
            return Err(EditorError::AlreadyExists(id));
        }
        self.create_record(id, record)
    }

    /// Replace an existing record. Fails if it does not exist. Returns
    /// `None` when the change was rejected or blocked by a shape lock.
    pub fn update(&mut self, record: impl Into<Record>) -> Result<Option<Record>> {
        let record = record.into();
        let id = record.id();
        let Some(previous) = self.records.get(&id).cloned() else {
            return Err(EditorError::NotFound(id));
        };
        self.update_record(id, previous, record)
    }

    /// Create or replace a single record.
    pub fn put_one(&mut self, record: impl Into<Record>) -> Result<Option<Record>> {
        let record = record.into();
        let id = record.id();
        match self.records.get(&id).cloned() {
            Some(previous) => self.update_record(id, previous, record),
            None => self.create_record(id, record),
        }
    }

    /// Create or replace records.
    pub fn put(&mut self, records: impl IntoIterator<Item = Record>) -> Result<()> {
        for record in records {
            self.put_one(record)?;
        }
        Ok(())
    }

    /// Delete records. Ids already deleted earlier in this transaction are
    /// skipped; ids that never existed are an error.
    pub fn delete(&mut self, ids: impl IntoIterator<Item = RecordId>) -> Result<()> {
        for id in ids {
            self.delete_one(id)?;
        }
        Ok(())
    }

    /// Delete one record. Returns whether it was actually removed.
    pub fn delete_one(&mut self, id: impl Into<RecordId>) -> Result<bool> {
        let id = id.into();
        let Some(previous) = self.records.get(&id).cloned() else {
            if self.removed.contains(&id) {
                return Ok(false);
            }
            return Err(EditorError::NotFound(id));
        };
        let kind = previous.type_name();
        if self.is_lock_blocked(&previous) {
            log::warn!("ignored delete of locked shape {id}");
            return Ok(false);
        }
        if self.side_effects {
            let effects = Arc::clone(&self.effects);
            for (_, handler) in effects.before_delete(kind) {
                if let Decision::Reject = handler(&self.view(), &previous, self.source)? {
                    log::debug!("delete of {id} rejected by side effect");
                    return Ok(false);
                }
            }
        }
        self.write(id.clone(), None);
        self.run_after(
            Operation::Delete,
            &id,
            AfterChange {
                before: Some(previous),
                after: None,
                source: self.source,
            },
        )?;
        Ok(true)
    }

    /// Edit a shape in place through a closure.
    pub fn update_shape(
        &mut self,
        id: &ShapeId,
        edit: impl FnOnce(&mut ShapeRecord),
    ) -> Result<Option<ShapeRecord>> {
        let mut shape = self
            .shape(id)
            .cloned()
            .ok_or_else(|| EditorError::NotFound(id.into()))?;
        edit(&mut shape);
        Ok(self.update(shape)?.and_then(|r| r.as_shape().cloned()))
    }

    /// Edit a binding in place through a closure.
    pub fn update_binding(
        &mut self,
        id: &BindingId,
        edit: impl FnOnce(&mut BindingRecord),
    ) -> Result<Option<BindingRecord>> {
        let mut binding = self
            .binding(id)
            .cloned()
            .ok_or_else(|| EditorError::NotFound(id.into()))?;
        edit(&mut binding);
        Ok(self.update(binding)?.and_then(|r| r.as_binding().cloned()))
    }

    /// Edit an instance record in place through a closure.
    pub fn update_instance(
        &mut self,
        id: &InstanceId,
        edit: impl FnOnce(&mut InstanceRecord),
    ) -> Result<Option<InstanceRecord>> {
        let mut instance = self
            .instance(id)
            .cloned()
            .ok_or_else(|| EditorError::NotFound(id.into()))?;
        edit(&mut instance);
        Ok(self.update(instance)?.and_then(|r| r.as_instance().cloned()))
    }

    fn create_record(&mut self, id: RecordId, record: Record) -> Result<Option<Record>> {
        let kind = record.type_name();
        let mut record = record;
        if self.side_effects {
            let effects = Arc::clone(&self.effects);
            for (_, handler) in effects.before_create(kind) {
                match handler(&self.view(), record, self.source)? {
                    Decision::Proceed(next) => record = next,
                    Decision::Reject => {
                        log::debug!("create of {id} rejected by side effect");
                        return Ok(None);
                    }
                }
            }
            ensure_same_id(&id, &record)?;
        }
        self.write(id.clone(), Some(record.clone()));
        self.run_after(
            Operation::Create,
            &id,
            AfterChange {
                before: None,
                after: Some(record.clone()),
                source: self.source,
            },
        )?;
        Ok(Some(record))
    }

    fn update_record(&mut self, id: RecordId, previous: Record, record: Record) -> Result<Option<Record>> {
        if previous == record {
            return Ok(Some(record));
        }
        if self.is_lock_blocked(&previous) {
            log::warn!("ignored update of locked shape {id}");
            return Ok(None);
        }
        let kind = record.type_name();
        let mut record = record;
        if self.side_effects {
            let effects = Arc::clone(&self.effects);
            for (_, handler) in effects.before_update(kind) {
                match handler(&self.view(), &previous, record, self.source)? {
                    Decision::Proceed(next) => record = next,
                    Decision::Reject => {
                        log::debug!("update of {id} rejected by side effect");
                        return Ok(None);
                    }
                }
            }
            ensure_same_id(&id, &record)?;
            if previous == record {
                return Ok(Some(record));
            }
        }
        self.write(id.clone(), Some(record.clone()));
        self.run_after(
            Operation::Update,
            &id,
            AfterChange {
                before: Some(previous),
                after: Some(record.clone()),
                source: self.source,
            },
        )?;
        Ok(Some(record))
    }

    fn is_lock_blocked(&self, previous: &Record) -> bool {
        if self.ignore_shape_lock || self.source == ChangeSource::Remote {
            return false;
        }
        match previous {
            Record::Shape(shape) => self.view().is_shape_or_ancestor_locked(&shape.id),
            _ => false,
        }
    }

    fn run_after(&mut self, operation: Operation, id: &RecordId, change: AfterChange) -> Result<()> {
        if !self.side_effects {
            return Ok(());
        }
        let effects = Arc::clone(&self.effects);
        for (handler_id, handler) in effects.after(id.type_name(), operation) {
            if self.cascade.iter().any(|(h, r)| h == handler_id && r == id) {
                return Err(EditorError::CascadeCycle {
                    id: id.clone(),
                    operation,
                    handler: *handler_id,
                });
            }
            if self.cascade.len() >= self.max_cascade_depth {
                return Err(EditorError::CascadeTooDeep(self.max_cascade_depth));
            }
            self.cascade.push((*handler_id, id.clone()));
            let result = handler(self, &change);
            self.cascade.pop();
            result?;
        }
        Ok(())
    }

    /// Apply a value verbatim and fold it into the pending diff.
    pub(crate) fn write(&mut self, id: RecordId, value: Option<Record>) {
        let before = match &value {
            Some(record) => {
                self.removed.remove(&id);
                self.records.insert(id.clone(), record.clone())
            }
            None => {
                let before = self.records.remove(&id);
                if before.is_some() {
                    self.removed.insert(id.clone());
                }
                before
            }
        };
        self.pending.record(id, before, value);
    }

    /// Restore the records to how they were when `savepoint` was taken.
    pub(crate) fn rollback_to(&mut self, savepoint: RecordsDiff) {
        let current = std::mem::take(&mut self.pending);
        for (id, change) in current.iter() {
            let target = match savepoint.get(id) {
                Some(saved) => saved.after.clone(),
                None => change.before.clone(),
            };
            self.restore(id, target);
        }
        for (id, saved) in savepoint.iter() {
            if !current.contains(id) {
                self.restore(id, saved.after.clone());
            }
        }
        self.pending = savepoint;
    }

    fn restore(&mut self, id: &RecordId, value: Option<Record>) {
        match value {
            Some(record) => {
                self.records.insert(id.clone(), record);
            }
            None => {
                self.records.remove(id);
            }
        }
    }

    /// Check every referential field touched by the pending changes.
    pub(crate) fn validate(&self) -> Result<()> {
        let view = self.view();
        for (_, change) in self.pending.iter() {
            if let Some(record) = &change.after {
                check_references(view, record)?;
                if let Record::Shape(shape) = record {
                    check_parent_chain(view, shape)?;
                }
            }
        }
        let removed: HashSet<&RecordId> = self.pending.removed().collect();
        if removed.is_empty() {
            return Ok(());
        }
        for record in view.records() {
            for (field, target, expected) in record.references() {
                if removed.contains(&target) {
                    return Err(EditorError::DanglingReference {
                        from: record.id(),
                        field,
                        to: target,
                        expected,
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn into_pending(self) -> RecordsDiff {
        self.pending
    }
}

fn ensure_same_id(id: &RecordId, record: &Record) -> Result<()> {
    if &record.id() == id {
        Ok(())
    } else {
        Err(EditorError::InvalidRecord {
            id: id.clone(),
            reason: format!("side effect replaced it with {}", record.id()),
        })
    }
}

fn check_references(view: RecordView<'_>, record: &Record) -> Result<()> {
    for (field, target, expected) in record.references() {
        match view.get(&target) {
            Some(found) if found.type_name() == expected => {}
            Some(_) => return Err(EditorError::WrongKind { id: target, expected }),
            None => {
                return Err(EditorError::DanglingReference {
                    from: record.id(),
                    field,
                    to: target,
                    expected,
                });
            }
        }
    }
    Ok(())
}

fn check_parent_chain(view: RecordView<'_>, shape: &ShapeRecord) -> Result<()> {
    let mut current = shape.parent_id.clone();
    let mut steps = 0;
    while let Some(parent_id) = current {
        if parent_id == shape.id || steps > view.len() {
            return Err(EditorError::ParentCycle(shape.id.clone().into()));
        }
        let Some(parent) = view.shape(&parent_id) else {
            break;
        };
        if parent.page_id != shape.page_id {
            return Err(EditorError::InvalidRecord {
                id: shape.id.clone().into(),
                reason: format!("parent {} is on another page", parent.id),
            });
        }
        current = parent.parent_id.clone();
        steps += 1;
    }
    Ok(())
}
