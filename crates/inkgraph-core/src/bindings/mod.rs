//! Bindings: typed relationships between two shapes.
//!
//! Each binding type has a [`BindingUtil`] whose callbacks run as side
//! effects of store mutations, so dependent shapes are updated in the same
//! transaction as the change that caused it. When either endpoint is
//! deleted the binding is removed with it; no binding outlives an endpoint
//! past commit.

mod arrow;

pub use arrow::{ArrowBindingUtil, ArrowTerminal};

use crate::error::{EditorError, Result};
use crate::records::{merge_props, BindingId, BindingRecord, Record, ShapeId, ShapeRecord, TypeName};
use crate::schema::Schema;
use crate::store::{Decision, RecordView, SideEffects, Transaction};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What should happen to a binding whose endpoint is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteCleanup {
    /// Remove the binding.
    #[default]
    DeleteBinding,
    /// The util removed or rewired the binding itself.
    Handled,
}

/// Behavior of one binding type. Every callback runs inside the
/// transaction that triggered it.
#[allow(unused_variables)]
pub trait BindingUtil: Send + Sync {
    /// The `type` string this util handles.
    fn binding_type(&self) -> &'static str;

    fn default_props(&self) -> Value;

    fn on_after_create(&self, tx: &mut Transaction<'_>, schema: &Schema, binding: &BindingRecord) -> Result<()> {
        Ok(())
    }

    fn on_after_change(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        prev: &BindingRecord,
        next: &BindingRecord,
    ) -> Result<()> {
        Ok(())
    }

    /// The `from` shape of `binding` changed.
    fn on_after_change_from_shape(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        binding: &BindingRecord,
        prev: &ShapeRecord,
        next: &ShapeRecord,
    ) -> Result<()> {
        Ok(())
    }

    /// The `to` shape of `binding` changed.
    fn on_after_change_to_shape(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        binding: &BindingRecord,
        prev: &ShapeRecord,
        next: &ShapeRecord,
    ) -> Result<()> {
        Ok(())
    }

    /// The `from` shape is being deleted.
    fn on_before_delete_from_shape(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        binding: &BindingRecord,
        shape: &ShapeRecord,
    ) -> Result<DeleteCleanup> {
        Ok(DeleteCleanup::DeleteBinding)
    }

    /// The `to` shape is being deleted.
    fn on_before_delete_to_shape(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        binding: &BindingRecord,
        shape: &ShapeRecord,
    ) -> Result<DeleteCleanup> {
        Ok(DeleteCleanup::DeleteBinding)
    }

    fn on_after_delete(&self, tx: &mut Transaction<'_>, schema: &Schema, binding: &BindingRecord) -> Result<()> {
        Ok(())
    }
}

/// Bindings grouped by endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingIndex {
    from: HashMap<ShapeId, Vec<BindingId>>,
    to: HashMap<ShapeId, Vec<BindingId>>,
}

impl BindingIndex {
    pub fn build(view: RecordView<'_>) -> Self {
        let mut index = Self::default();
        for binding in view.bindings() {
            index.from.entry(binding.from_id.clone()).or_default().push(binding.id.clone());
            index.to.entry(binding.to_id.clone()).or_default().push(binding.id.clone());
        }
        for ids in index.from.values_mut().chain(index.to.values_mut()) {
            ids.sort();
        }
        index
    }

    pub fn from_shape(&self, shape: &ShapeId) -> &[BindingId] {
        self.from.get(shape).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn to_shape(&self, shape: &ShapeId) -> &[BindingId] {
        self.to.get(shape).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Bindings with `shape` at either end, without duplicates.
    pub fn involving(&self, shape: &ShapeId) -> Vec<BindingId> {
        let mut ids: Vec<BindingId> = self
            .from_shape(shape)
            .iter()
            .chain(self.to_shape(shape))
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn util_for<'s>(schema: &'s Schema, binding: &BindingRecord) -> Result<&'s Arc<dyn BindingUtil>> {
    schema
        .binding_util(&binding.binding_type)
        .ok_or_else(|| EditorError::UnknownBindingType(binding.binding_type.clone()))
}

fn with_default_props(schema: &Schema, mut binding: BindingRecord) -> Result<BindingRecord> {
    let util = util_for(schema, &binding)?;
    if binding.from_id == binding.to_id {
        return Err(EditorError::InvalidRecord {
            id: binding.id.clone().into(),
            reason: "a binding cannot connect a shape to itself".into(),
        });
    }
    binding.props = merge_props(util.default_props(), &binding.props);
    Ok(binding)
}

/// Register the binding side effects for every util in `schema`.
pub(crate) fn install(effects: &mut SideEffects, schema: &Arc<Schema>) {
    let s = Arc::clone(schema);
    effects.register_before_create(TypeName::Binding, move |_, record, _| {
        let Record::Binding(binding) = record else {
            return Ok(Decision::Proceed(record));
        };
        Ok(Decision::Proceed(with_default_props(&s, binding)?.into()))
    });

    let s = Arc::clone(schema);
    effects.register_before_update(TypeName::Binding, move |_, _, record, _| {
        let Record::Binding(binding) = record else {
            return Ok(Decision::Proceed(record));
        };
        Ok(Decision::Proceed(with_default_props(&s, binding)?.into()))
    });

    let s = Arc::clone(schema);
    effects.register_after_create(TypeName::Binding, move |tx, change| {
        let Some(Record::Binding(binding)) = &change.after else {
            return Ok(());
        };
        util_for(&s, binding)?.on_after_create(tx, &s, binding)
    });

    let s = Arc::clone(schema);
    effects.register_after_update(TypeName::Binding, move |tx, change| {
        let (Some(Record::Binding(prev)), Some(Record::Binding(next))) = (&change.before, &change.after) else {
            return Ok(());
        };
        util_for(&s, next)?.on_after_change(tx, &s, prev, next)
    });

    let s = Arc::clone(schema);
    effects.register_after_delete(TypeName::Binding, move |tx, change| {
        let Some(Record::Binding(binding)) = &change.before else {
            return Ok(());
        };
        util_for(&s, binding)?.on_after_delete(tx, &s, binding)
    });

    let s = Arc::clone(schema);
    effects.register_after_update(TypeName::Shape, move |tx, change| {
        let (Some(Record::Shape(prev)), Some(Record::Shape(next))) = (&change.before, &change.after) else {
            return Ok(());
        };
        let bindings: Vec<BindingRecord> = tx
            .view()
            .bindings_involving(&next.id)
            .into_iter()
            .cloned()
            .collect();
        for binding in bindings {
            // An earlier callback may have removed it.
            if tx.binding(&binding.id).is_none() {
                continue;
            }
            let util = util_for(&s, &binding)?;
            if binding.from_id == next.id {
                util.on_after_change_from_shape(tx, &s, &binding, prev, next)?;
            }
            if binding.to_id == next.id {
                util.on_after_change_to_shape(tx, &s, &binding, prev, next)?;
            }
        }
        Ok(())
    });

    let s = Arc::clone(schema);
    effects.register_after_delete(TypeName::Shape, move |tx, change| {
        let Some(Record::Shape(shape)) = &change.before else {
            return Ok(());
        };
        let bindings: Vec<BindingRecord> = tx
            .view()
            .bindings_involving(&shape.id)
            .into_iter()
            .cloned()
            .collect();
        for binding in bindings {
            if tx.binding(&binding.id).is_none() {
                continue;
            }
            let util = util_for(&s, &binding)?;
            let cleanup = if binding.from_id == shape.id {
                util.on_before_delete_from_shape(tx, &s, &binding, shape)?
            } else {
                util.on_before_delete_to_shape(tx, &s, &binding, shape)?
            };
            if cleanup == DeleteCleanup::DeleteBinding && tx.binding(&binding.id).is_some() {
                log::debug!("removing {} with deleted endpoint {}", binding.id, shape.id);
                tx.delete_one(binding.id.clone())?;
            }
        }
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PageId, PageRecord};
    use crate::store::{RecordStore, TransactionConfig};
    use serde_json::json;

    /// Rewires a binding onto a fallback shape instead of dropping it.
    struct Sticky;

    impl BindingUtil for Sticky {
        fn binding_type(&self) -> &'static str {
            "sticky"
        }

        fn default_props(&self) -> Value {
            json!({})
        }

        fn on_before_delete_to_shape(
            &self,
            tx: &mut Transaction<'_>,
            _schema: &Schema,
            binding: &BindingRecord,
            _shape: &ShapeRecord,
        ) -> Result<DeleteCleanup> {
            tx.update_binding(&binding.id, |b| b.to_id = ShapeId::from_key("fallback"))?;
            Ok(DeleteCleanup::Handled)
        }
    }

    fn setup(schema: Schema) -> (RecordStore, PageId) {
        let store = RecordStore::new(schema);
        let page = PageRecord::new("p");
        let page_id = page.id.clone();
        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(page)?;
                for key in ["a", "b", "fallback"] {
                    tx.create(ShapeRecord::new("geo", page_id.clone()).with_id(ShapeId::from_key(key)))?;
                }
                Ok(())
            })
            .unwrap();
        (store, page_id)
    }

    #[test]
    fn test_index_by_endpoint() {
        let (store, _) = setup(Schema::default().with_binding_util(Sticky));
        let binding = BindingRecord::new("sticky", ShapeId::from_key("a"), ShapeId::from_key("b"));
        let id = binding.id.clone();
        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(binding)?;
                Ok(())
            })
            .unwrap();
        let index = store.read(BindingIndex::build);
        assert_eq!(index.from_shape(&ShapeId::from_key("a")), &[id.clone()]);
        assert_eq!(index.to_shape(&ShapeId::from_key("b")), &[id.clone()]);
        assert!(index.from_shape(&ShapeId::from_key("b")).is_empty());
        assert_eq!(index.involving(&ShapeId::from_key("b")), vec![id]);
    }

    #[test]
    fn test_unknown_binding_type() {
        let (store, _) = setup(Schema::default());
        let err = store
            .run(TransactionConfig::default(), |tx| {
                tx.create(BindingRecord::new("glue", ShapeId::from_key("a"), ShapeId::from_key("b")))
            })
            .unwrap_err();
        assert_eq!(err, EditorError::UnknownBindingType("glue".into()));
    }

    #[test]
    fn test_self_binding_is_invalid() {
        let (store, _) = setup(Schema::default());
        let err = store
            .run(TransactionConfig::default(), |tx| {
                tx.create(BindingRecord::new("arrow", ShapeId::from_key("a"), ShapeId::from_key("a")))
            })
            .unwrap_err();
        assert!(matches!(err, EditorError::InvalidRecord { .. }));
    }

    #[test]
    fn test_handled_cleanup_keeps_binding() {
        let (store, _) = setup(Schema::default().with_binding_util(Sticky));
        let binding = BindingRecord::new("sticky", ShapeId::from_key("a"), ShapeId::from_key("b"));
        let id = binding.id.clone();
        store
            .run(TransactionConfig::default(), |tx| {
                tx.create(binding)?;
                Ok(())
            })
            .unwrap();
        store
            .run(TransactionConfig::default(), |tx| tx.delete_one(ShapeId::from_key("b")))
            .unwrap();
        assert_eq!(store.binding(&id).unwrap().to_id, ShapeId::from_key("fallback"));

        // Deleting the `from` end uses the default cleanup.
        store
            .run(TransactionConfig::default(), |tx| tx.delete_one(ShapeId::from_key("a")))
            .unwrap();
        assert!(store.binding(&id).is_none());
    }
}
