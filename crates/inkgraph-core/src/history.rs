//! Undo/redo over committed diffs.
//!
//! The undo stack holds diffs and marks. A mark is a stopping point: `undo`
//! reverts everything recorded since the most recent mark and consumes it,
//! `redo` replays forward to the next mark. Only the document part of a diff
//! (shapes, bindings, pages) is recorded; camera and instance changes are
//! never undone.

use crate::error::Result;
use crate::records::RecordScope;
use crate::store::{ChangeSource, RecordStore, RecordsDiff};
use std::fmt;

/// Identifies a history mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkId(u64);

impl fmt::Display for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mark:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum HistoryEntry {
    Diff(RecordsDiff),
    Mark(MarkId),
}

/// Undo and redo stacks of one editor.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    undos: Vec<HistoryEntry>,
    redos: Vec<HistoryEntry>,
    next_mark: u64,
    max_entries: Option<usize>,
}

impl HistoryManager {
    /// A history keeping at most `max_entries` undo entries, if set.
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            max_entries,
            ..Self::default()
        }
    }

    /// Push the document part of a committed diff. Clears the redo stack.
    /// Returns false if there was nothing to record.
    pub fn record(&mut self, diff: &RecordsDiff) -> bool {
        let diff = diff.filter_scope(RecordScope::Document);
        if diff.is_empty() {
            return false;
        }
        self.undos.push(HistoryEntry::Diff(diff));
        self.redos.clear();
        self.enforce_cap();
        true
    }

    /// Push a stopping point. Clears the redo stack.
    pub fn mark(&mut self) -> MarkId {
        self.next_mark += 1;
        let id = MarkId(self.next_mark);
        self.undos.push(HistoryEntry::Mark(id));
        self.redos.clear();
        self.enforce_cap();
        log::trace!("history {id}");
        id
    }

    /// Drop the oldest undo entries beyond `max_entries`. The newest mark and
    /// everything after it are kept, so a gesture in progress can still bail
    /// back to where it started.
    fn enforce_cap(&mut self) {
        let Some(max) = self.max_entries else {
            return;
        };
        if self.undos.len() <= max {
            return;
        }
        let newest_mark = self
            .undos
            .iter()
            .rposition(|e| matches!(e, HistoryEntry::Mark(_)))
            .unwrap_or(self.undos.len());
        let excess = self.undos.len() - max;
        if excess > newest_mark {
            log::debug!("history over its cap by {} entries since the last mark", excess - newest_mark);
        }
        self.undos.drain(..excess.min(newest_mark));
    }

    pub fn can_undo(&self) -> bool {
        self.undos.iter().any(|e| matches!(e, HistoryEntry::Diff(_)))
    }

    pub fn can_redo(&self) -> bool {
        self.redos.iter().any(|e| matches!(e, HistoryEntry::Diff(_)))
    }

    pub fn clear(&mut self) {
        self.undos.clear();
        self.redos.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undos.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redos.len()
    }

    /// Revert back to the most recent mark. Returns whether anything changed.
    pub fn undo(&mut self, store: &RecordStore) -> Result<bool> {
        self.rewind(store, true, None)
    }

    /// Revert back to the most recent mark without keeping a redo entry.
    pub fn bail(&mut self, store: &RecordStore) -> Result<bool> {
        self.rewind(store, false, None)
    }

    /// Revert back to `mark` without keeping redo entries. An unknown mark
    /// leaves everything untouched.
    pub fn bail_to_mark(&mut self, store: &RecordStore, mark: MarkId) -> Result<bool> {
        self.rewind(store, false, Some(mark))
    }

    fn rewind(&mut self, store: &RecordStore, keep_redo: bool, to_mark: Option<MarkId>) -> Result<bool> {
        if let Some(mark) = to_mark {
            if !self.undos.contains(&HistoryEntry::Mark(mark)) {
                log::warn!("ignoring bail to unknown {mark}");
                return Ok(false);
            }
        }

        let mut undos = self.undos.clone();
        let mut redos = self.redos.clone();
        let mut to_undo = RecordsDiff::new();
        let mut found = false;

        // Nothing since the last mark: step over the trailing marks first.
        while let Some(HistoryEntry::Mark(mark)) = undos.last().cloned() {
            undos.pop();
            if keep_redo {
                redos.push(HistoryEntry::Mark(mark));
            }
            if Some(mark) == to_mark {
                found = true;
                break;
            }
        }

        if !found {
            while let Some(entry) = undos.pop() {
                if keep_redo {
                    redos.push(entry.clone());
                }
                match entry {
                    HistoryEntry::Diff(diff) => to_undo.squash(&diff.inverse()),
                    HistoryEntry::Mark(mark) => {
                        if to_mark.is_none() || Some(mark) == to_mark {
                            break;
                        }
                    }
                }
            }
        }

        if !to_undo.is_empty() {
            store.apply_diff(&to_undo, ChangeSource::User)?;
            log::debug!("reverted {} change(s)", to_undo.len());
        }
        let changed = !to_undo.is_empty();
        self.undos = undos;
        self.redos = redos;
        Ok(changed)
    }

    /// Replay forward to the next mark. Returns whether anything changed.
    pub fn redo(&mut self, store: &RecordStore) -> Result<bool> {
        if self.redos.is_empty() {
            return Ok(false);
        }
        let mut undos = self.undos.clone();
        let mut redos = self.redos.clone();

        while let Some(HistoryEntry::Mark(mark)) = redos.last().cloned() {
            redos.pop();
            undos.push(HistoryEntry::Mark(mark));
        }

        let mut to_redo = RecordsDiff::new();
        while let Some(entry) = redos.pop() {
            undos.push(entry.clone());
            match entry {
                HistoryEntry::Diff(diff) => to_redo.squash(&diff),
                HistoryEntry::Mark(_) => break,
            }
        }

        if !to_redo.is_empty() {
            store.apply_diff(&to_redo, ChangeSource::User)?;
            log::debug!("replayed {} change(s)", to_redo.len());
        }
        let changed = !to_redo.is_empty();
        self.undos = undos;
        self.redos = redos;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{CameraRecord, PageId, PageRecord, ShapeId, ShapeRecord};
    use crate::store::{TransactOptions, Transaction};

    struct Fixture {
        store: RecordStore,
        history: HistoryManager,
        page: PageId,
    }

    impl Fixture {
        fn new() -> Self {
            let page = PageRecord::new("Page 1");
            let mut fixture = Self {
                store: RecordStore::default(),
                history: HistoryManager::new(None),
                page: page.id.clone(),
            };
            fixture.apply(|tx| {
                tx.create(page)?;
                Ok(())
            });
            fixture.history.clear();
            fixture
        }

        fn apply(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> Result<()>) {
            let (_, diff) = self.store.transact_with(TransactOptions::default(), f).unwrap();
            self.history.record(&diff);
        }

        fn create(&mut self, key: &str) {
            let shape = ShapeRecord::new("geo", self.page.clone()).with_id(ShapeId::from_key(key));
            self.apply(|tx| {
                tx.create(shape)?;
                Ok(())
            });
        }

        fn move_to(&mut self, key: &str, x: f64) {
            self.apply(|tx| {
                tx.update_shape(&ShapeId::from_key(key), |s| s.x = x)?;
                Ok(())
            });
        }

        fn x(&self, key: &str) -> Option<f64> {
            self.store.shape(&ShapeId::from_key(key)).map(|s| s.x)
        }
    }

    #[test]
    fn test_undo_to_mark_and_redo() {
        let mut f = Fixture::new();
        f.history.mark();
        f.create("a");
        f.move_to("a", 10.0);
        f.history.mark();
        f.move_to("a", 20.0);
        f.move_to("a", 30.0);

        assert!(f.history.undo(&f.store).unwrap());
        assert_eq!(f.x("a"), Some(10.0));
        assert!(f.history.undo(&f.store).unwrap());
        assert_eq!(f.x("a"), None);
        assert!(!f.history.undo(&f.store).unwrap());

        assert!(f.history.redo(&f.store).unwrap());
        assert_eq!(f.x("a"), Some(10.0));
        assert!(f.history.redo(&f.store).unwrap());
        assert_eq!(f.x("a"), Some(30.0));
        assert!(!f.history.redo(&f.store).unwrap());
    }

    #[test]
    fn test_new_change_clears_redo() {
        let mut f = Fixture::new();
        f.create("a");
        f.history.undo(&f.store).unwrap();
        assert!(f.history.can_redo());
        f.create("b");
        assert!(!f.history.can_redo());
        assert!(!f.history.redo(&f.store).unwrap());
        assert_eq!(f.x("a"), None);
    }

    #[test]
    fn test_bail_does_not_keep_redo() {
        let mut f = Fixture::new();
        f.create("a");
        f.history.mark();
        f.move_to("a", 50.0);
        assert!(f.history.bail(&f.store).unwrap());
        assert_eq!(f.x("a"), Some(0.0));
        assert!(!f.history.can_redo());
    }

    #[test]
    fn test_bail_to_mark_skips_intermediate_marks() {
        let mut f = Fixture::new();
        f.create("a");
        let mark = f.history.mark();
        f.move_to("a", 10.0);
        f.history.mark();
        f.move_to("a", 20.0);
        assert!(f.history.bail_to_mark(&f.store, mark).unwrap());
        assert_eq!(f.x("a"), Some(0.0));
        assert!(!f.history.redo(&f.store).unwrap());
        assert_eq!(f.x("a"), Some(0.0));
        // The first creation is still undoable.
        assert!(f.history.undo(&f.store).unwrap());
        assert_eq!(f.x("a"), None);
    }

    #[test]
    fn test_bail_to_unknown_mark_is_noop() {
        let mut f = Fixture::new();
        f.create("a");
        assert!(!f.history.bail_to_mark(&f.store, MarkId(999)).unwrap());
        assert_eq!(f.x("a"), Some(0.0));
        assert_eq!(f.history.undo_len(), 1);
    }

    #[test]
    fn test_session_changes_are_not_recorded() {
        let mut f = Fixture::new();
        let camera = CameraRecord::for_page(&f.page);
        f.apply(|tx| {
            tx.create(camera)?;
            Ok(())
        });
        assert!(!f.history.can_undo());
    }

    #[test]
    fn test_max_entries() {
        let store = RecordStore::default();
        let mut history = HistoryManager::new(Some(2));
        for _ in 0..5 {
            history.mark();
        }
        assert_eq!(history.undo_len(), 2);
        assert!(!history.undo(&store).unwrap());
    }

    #[test]
    fn test_max_entries_keeps_newest_mark() {
        let mut f = Fixture::new();
        f.history = HistoryManager::new(Some(3));
        f.create("a");
        let mark = f.history.mark();
        for x in [10.0, 20.0, 30.0, 40.0] {
            f.move_to("a", x);
        }
        assert_eq!(f.history.undo_len(), 5);

        assert!(f.history.bail_to_mark(&f.store, mark).unwrap());
        assert_eq!(f.x("a"), Some(0.0));
        // The creation fell off the bottom of the stack.
        assert!(!f.history.can_undo());
    }
}
