//! Before/after hooks keyed by record kind and operation.
//!
//! Handlers for the same kind and phase run in registration order. Each
//! before-create/update handler sees the record as substituted by the ones
//! registered before it.

use super::transaction::Transaction;
use super::view::RecordView;
use crate::error::Result;
use crate::records::{Record, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of mutation a handler is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Who originated a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// A local interaction.
    #[default]
    User,
    /// A change replayed from a collaborator.
    Remote,
}

/// Outcome of a before-handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    /// Apply the mutation, possibly with a substituted value.
    Proceed(T),
    /// Drop this one mutation. Sibling mutations are unaffected.
    Reject,
}

/// What an after-handler is told about an applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct AfterChange {
    pub before: Option<Record>,
    pub after: Option<Record>,
    pub source: ChangeSource,
}

/// Identifies a registered handler so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type BeforeCreateHandler =
    Arc<dyn Fn(&RecordView<'_>, Record, ChangeSource) -> Result<Decision<Record>> + Send + Sync>;
pub type BeforeUpdateHandler = Arc<
    dyn Fn(&RecordView<'_>, &Record, Record, ChangeSource) -> Result<Decision<Record>> + Send + Sync,
>;
pub type BeforeDeleteHandler =
    Arc<dyn Fn(&RecordView<'_>, &Record, ChangeSource) -> Result<Decision<()>> + Send + Sync>;
pub type AfterHandler =
    Arc<dyn Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync>;

/// Registry of side-effect handlers owned by one store.
#[derive(Clone, Default)]
pub struct SideEffects {
    next_id: u64,
    before_create: HashMap<TypeName, Vec<(HandlerId, BeforeCreateHandler)>>,
    before_update: HashMap<TypeName, Vec<(HandlerId, BeforeUpdateHandler)>>,
    before_delete: HashMap<TypeName, Vec<(HandlerId, BeforeDeleteHandler)>>,
    after: HashMap<(TypeName, Operation), Vec<(HandlerId, AfterHandler)>>,
}

impl fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SideEffects")
            .field("before_create", &self.before_create.len())
            .field("before_update", &self.before_update.len())
            .field("before_delete", &self.before_delete.len())
            .field("after", &self.after.len())
            .finish()
    }
}

impl SideEffects {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> HandlerId {
        self.next_id += 1;
        HandlerId(self.next_id)
    }

    pub fn register_before_create<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, Record, ChangeSource) -> Result<Decision<Record>> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.before_create.entry(kind).or_default().push((id, Arc::new(handler)));
        id
    }

    pub fn register_before_update<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, &Record, Record, ChangeSource) -> Result<Decision<Record>>
            + Send
            + Sync
            + 'static,
    {
        let id = self.next_id();
        self.before_update.entry(kind).or_default().push((id, Arc::new(handler)));
        id
    }

    pub fn register_before_delete<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&RecordView<'_>, &Record, ChangeSource) -> Result<Decision<()>> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.before_delete.entry(kind).or_default().push((id, Arc::new(handler)));
        id
    }

    pub fn register_after_create<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.register_after(kind, Operation::Create, Arc::new(handler))
    }

    pub fn register_after_update<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.register_after(kind, Operation::Update, Arc::new(handler))
    }

    pub fn register_after_delete<F>(&mut self, kind: TypeName, handler: F) -> HandlerId
    where
        F: Fn(&mut Transaction<'_>, &AfterChange) -> Result<()> + Send + Sync + 'static,
    {
        self.register_after(kind, Operation::Delete, Arc::new(handler))
    }

    fn register_after(&mut self, kind: TypeName, operation: Operation, handler: AfterHandler) -> HandlerId {
        let id = self.next_id();
        self.after.entry((kind, operation)).or_default().push((id, handler));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        fn remove<H>(map: &mut HashMap<impl std::hash::Hash + Eq, Vec<(HandlerId, H)>>, id: HandlerId) -> bool {
            let mut found = false;
            for handlers in map.values_mut() {
                let len = handlers.len();
                handlers.retain(|(handler_id, _)| *handler_id != id);
                found |= handlers.len() != len;
            }
            found
        }
        remove(&mut self.before_create, id)
            | remove(&mut self.before_update, id)
            | remove(&mut self.before_delete, id)
            | remove(&mut self.after, id)
    }

    pub(crate) fn before_create(&self, kind: TypeName) -> &[(HandlerId, BeforeCreateHandler)] {
        self.before_create.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn before_update(&self, kind: TypeName) -> &[(HandlerId, BeforeUpdateHandler)] {
        self.before_update.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn before_delete(&self, kind: TypeName) -> &[(HandlerId, BeforeDeleteHandler)] {
        self.before_delete.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn after(&self, kind: TypeName, operation: Operation) -> &[(HandlerId, AfterHandler)] {
        self.after.get(&(kind, operation)).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_unregister() {
        let mut effects = SideEffects::new();
        let a = effects.register_before_create(TypeName::Shape, |_, r, _| Ok(Decision::Proceed(r)));
        let b = effects.register_after_delete(TypeName::Shape, |_, _| Ok(()));
        assert_ne!(a, b);
        assert_eq!(effects.before_create(TypeName::Shape).len(), 1);
        assert_eq!(effects.after(TypeName::Shape, Operation::Delete).len(), 1);

        assert!(effects.unregister(a));
        assert!(!effects.unregister(a));
        assert!(effects.before_create(TypeName::Shape).is_empty());
        assert!(effects.unregister(b));
        assert!(effects.after(TypeName::Shape, Operation::Delete).is_empty());
    }

    #[test]
    fn test_kinds_are_isolated() {
        let mut effects = SideEffects::new();
        effects.register_before_delete(TypeName::Binding, |_, _, _| Ok(Decision::Reject));
        assert!(effects.before_delete(TypeName::Shape).is_empty());
        assert_eq!(effects.before_delete(TypeName::Binding).len(), 1);
    }
}
