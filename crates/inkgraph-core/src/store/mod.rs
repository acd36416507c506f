//! The record store.
//!
//! A [`RecordStore`] is a cheap, cloneable handle to one set of records.
//! Every mutation goes through a [`Transaction`]; a transaction holds the
//! store's write lock until it commits or rolls back, so readers on other
//! handles only ever see committed states.

mod computed;
mod diff;
mod integrity;
mod side_effects;
mod transaction;
mod view;

pub use computed::{Computed, Dependency};
pub use diff::{RecordChange, RecordsDiff};
pub use side_effects::{
    AfterChange, AfterHandler, BeforeCreateHandler, BeforeDeleteHandler, BeforeUpdateHandler,
    ChangeSource, Decision, HandlerId, Operation, SideEffects,
};
pub use transaction::{HistoryMode, Transaction, TransactionConfig};
pub use view::RecordView;

use crate::error::{EditorError, Result};
use crate::records::{
    BindingId, BindingRecord, CameraId, CameraRecord, InstanceId, InstanceRecord, PageId,
    PageRecord, Record, RecordId, ShapeId, ShapeRecord, TypeName,
};
use crate::schema::Schema;
use computed::Epochs;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What happens to the children of a deleted shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildDeletePolicy {
    /// Delete the whole subtree.
    #[default]
    Delete,
    /// Move the children up to the deleted shape's parent.
    Reparent,
}

/// Store-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreOptions {
    /// Maximum nesting of after-handlers triggered by after-handlers.
    pub max_cascade_depth: usize,
    pub child_delete_policy: ChildDeletePolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_cascade_depth: 64,
            child_delete_policy: ChildDeletePolicy::Delete,
        }
    }
}

impl StoreOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// How a transaction is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactOptions {
    pub config: TransactionConfig,
    pub source: ChangeSource,
    /// When false, no side-effect handler runs.
    pub side_effects: bool,
}

impl Default for TransactOptions {
    fn default() -> Self {
        Self {
            config: TransactionConfig::default(),
            source: ChangeSource::User,
            side_effects: true,
        }
    }
}

/// Notification sent to listeners after a commit.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub diff: Arc<RecordsDiff>,
    pub source: ChangeSource,
    pub history: HistoryMode,
}

pub type Listener = Arc<dyn Fn(&StoreChange) + Send + Sync>;

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct StoreState {
    records: HashMap<RecordId, Record>,
    effects: Arc<SideEffects>,
    schema: Arc<Schema>,
    options: StoreOptions,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    epochs: Epochs,
}

/// Shared handle to a set of records.
#[derive(Clone)]
pub struct RecordStore {
    state: Arc<RwLock<StoreState>>,
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("RecordStore")
            .field("records", &state.records.len())
            .field("listeners", &state.listeners.len())
            .field("effects", &state.effects)
            .finish()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new(Schema::default())
    }
}

impl RecordStore {
    pub fn new(schema: Schema) -> Self {
        Self::with_options(schema, StoreOptions::default())
    }

    /// Create an empty store. The integrity handlers for `schema` are
    /// registered before any user handler.
    pub fn with_options(schema: Schema, options: StoreOptions) -> Self {
        let schema = Arc::new(schema);
        let mut effects = SideEffects::new();
        integrity::install(&mut effects, &schema, &options);
        Self {
            state: Arc::new(RwLock::new(StoreState {
                records: HashMap::new(),
                effects: Arc::new(effects),
                schema,
                options,
                listeners: Vec::new(),
                next_listener: 0,
                epochs: Epochs::default(),
            })),
        }
    }

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.state.read().schema)
    }

    pub fn options(&self) -> StoreOptions {
        self.state.read().options
    }

    /// Whether two handles share the same records.
    pub fn same_store(&self, other: &RecordStore) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.state.read().records.get(id).cloned()
    }

    pub fn has(&self, id: &RecordId) -> bool {
        self.state.read().records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self, id: &ShapeId) -> Option<ShapeRecord> {
        self.read(|view| view.shape(id).cloned())
    }

    pub fn binding(&self, id: &BindingId) -> Option<BindingRecord> {
        self.read(|view| view.binding(id).cloned())
    }

    pub fn page(&self, id: &PageId) -> Option<PageRecord> {
        self.read(|view| view.page(id).cloned())
    }

    pub fn camera(&self, id: &CameraId) -> Option<CameraRecord> {
        self.read(|view| view.camera(id).cloned())
    }

    pub fn instance(&self, id: &InstanceId) -> Option<InstanceRecord> {
        self.read(|view| view.instance(id).cloned())
    }

    /// All records of a kind, in no particular order.
    pub fn all_of(&self, kind: TypeName) -> Vec<Record> {
        self.read(|view| view.of_kind(kind).cloned().collect())
    }

    /// Read the committed state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(RecordView<'_>) -> R) -> R {
        let state = self.state.read();
        f(RecordView::new(&state.records))
    }

    pub(crate) fn read_with_epochs<R>(&self, f: impl FnOnce(RecordView<'_>, &Epochs) -> R) -> R {
        let state = self.state.read();
        f(RecordView::new(&state.records), &state.epochs)
    }

    /// Run `f` in a user-sourced transaction.
    pub fn run<T>(
        &self,
        config: TransactionConfig,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let options = TransactOptions {
            config,
            ..TransactOptions::default()
        };
        self.transact_with(options, f).map(|(value, _)| value)
    }

    /// Run `f` in a transaction attributed to a remote collaborator.
    pub fn merge_remote_changes<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let options = TransactOptions {
            source: ChangeSource::Remote,
            ..TransactOptions::default()
        };
        self.transact_with(options, f).map(|(value, _)| value)
    }

    /// Write `diff` verbatim: every `after` value replaces the current one.
    /// Side effects are skipped; references are still validated. Session
    /// records left pointing at removed pages or shapes are repaired in the
    /// same transaction.
    pub fn apply_diff(&self, diff: &RecordsDiff, source: ChangeSource) -> Result<RecordsDiff> {
        let options = TransactOptions {
            config: TransactionConfig::ignore_history(),
            source,
            side_effects: false,
        };
        self.transact_with(options, |tx| {
            for (id, change) in diff.iter() {
                tx.write(id.clone(), change.after.clone());
            }
            integrity::repair_session_records(tx);
            Ok(())
        })
        .map(|(_, diff)| diff)
    }

    /// Run `f` in a transaction and return its value with the committed
    /// diff. On error every change made by `f` is rolled back.
    pub fn transact_with<T>(
        &self,
        options: TransactOptions,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<(T, RecordsDiff)> {
        let (value, diff, listeners) = {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let mut tx = Transaction::new(
                &mut state.records,
                Arc::clone(&state.effects),
                state.options.max_cascade_depth,
                options.config,
                options.source,
                options.side_effects,
            );
            match f(&mut tx).and_then(|value| tx.validate().map(|()| value)) {
                Ok(value) => {
                    let diff = tx.into_pending();
                    if diff.is_empty() {
                        return Ok((value, diff));
                    }
                    state.epochs.bump(diff.ids());
                    log::debug!(
                        "committed {} change(s) to {:?} ({:?})",
                        diff.len(),
                        diff.type_names(),
                        options.source
                    );
                    let listeners: Vec<Listener> =
                        state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
                    (value, diff, listeners)
                }
                Err(err) => {
                    tx.rollback_to(RecordsDiff::new());
                    log::warn!("transaction rolled back: {err}");
                    return Err(err);
                }
            }
        };

        let change = StoreChange {
            diff: Arc::new(diff.clone()),
            source: options.source,
            history: options.config.history,
        };
        for listener in listeners {
            listener(&change);
        }
        Ok((value, diff))
    }

    /// Replace the whole contents, bypassing side effects. References are
    /// validated.
    pub fn replace_all(&self, records: Vec<Record>) -> Result<()> {
        let options = TransactOptions {
            config: TransactionConfig::ignore_history(),
            source: ChangeSource::Remote,
            side_effects: false,
        };
        self.transact_with(options, |tx| {
            let existing: Vec<RecordId> = tx.view().records().map(Record::id).collect();
            for id in existing {
                tx.write(id, None);
            }
            for record in records {
                let id = record.id();
                if tx.get(&id).is_some() {
                    return Err(EditorError::AlreadyExists(id));
                }
                tx.write(id, Some(record));
            }
            Ok(())
        })
        .map(|_| ())
    }

    /// Call `listener` after every commit that changed something.
    pub fn listen<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        let mut state = self.state.write();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut state = self.state.write();
        let len = state.listeners.len();
        state.listeners.retain(|(listener, _)| *listener != id);
        state.listeners.len() != len
    }

    /// Mutate the side-effect registry. Transactions already running keep
    /// the registry they started with.
    pub fn side_effects<R>(&self, f: impl FnOnce(&mut SideEffects) -> R) -> R {
        let mut state = self.state.write();
        f(Arc::make_mut(&mut state.effects))
    }

    pub fn register_before_create<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, Record, ChangeSource) -> Result<Decision<Record>> + Send + Sync + 'static,
    {
        self.side_effects(|effects| effects.register_before_create(kind, handler))
    }

    pub fn register_before_update<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, &Record, Record, ChangeSource) -> Result<Decision<Record>>
            + Send
            + Sync
            + 'static,
    {
        self.side_effects(|effects| effects.register_before_update(kind, handler))
    }

    pub fn register_before_delete<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, &Record, ChangeSource) -> Result<Decision<()>> + Send + Sync + 'static,
    {
        self.side_effects(|effects| effects.register_before_delete(kind, handler))
    }

    pub fn register_after_create<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.side_effects(|effects| effects.register_after_create(kind, handler))
    }

    pub fn register_after_update<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.side_effects(|effects| effects.register_after_update(kind, handler))
    }

    pub fn register_after_delete<F>(&self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.side_effects(|effects| effects.register_after_delete(kind, handler))
    }

    pub fn unregister(&self, id: HandlerId) -> bool {
        self.side_effects(|effects| effects.unregister(id))
    }
}
