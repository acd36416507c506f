//! Built-in side effects that keep the document structurally sound.

use super::side_effects::{Decision, SideEffects};
use super::transaction::{Transaction, TransactionConfig};
use super::{ChildDeletePolicy, StoreOptions};
use crate::error::{EditorError, Result};
use crate::records::{
    merge_props, CameraId, InstanceId, InstanceRecord, Record, ShapeId, ShapeRecord, TypeName,
};
use crate::schema::Schema;
use std::sync::Arc;

/// Register the structural handlers. Installed before any user handler, so
/// user before-handlers see records with default props filled in.
pub(super) fn install(effects: &mut SideEffects, schema: &Arc<Schema>, options: &StoreOptions) {
    let shapes = Arc::clone(schema);
    effects.register_before_create(TypeName::Shape, move |_, record, _| {
        let Record::Shape(shape) = record else {
            return Ok(Decision::Proceed(record));
        };
        Ok(Decision::Proceed(with_default_props(&shapes, shape)?.into()))
    });

    let shapes = Arc::clone(schema);
    effects.register_before_update(TypeName::Shape, move |_, _, record, _| {
        let Record::Shape(shape) = record else {
            return Ok(Decision::Proceed(record));
        };
        Ok(Decision::Proceed(with_default_props(&shapes, shape)?.into()))
    });

    crate::bindings::install(effects, schema);

    let policy = options.child_delete_policy;
    let shapes = Arc::clone(schema);
    effects.register_after_delete(TypeName::Shape, move |tx, change| {
        let Some(Record::Shape(deleted)) = &change.before else {
            return Ok(());
        };
        remove_children(tx, deleted, policy)?;
        remove_empty_parent(tx, deleted, &shapes)?;
        deselect(tx, &deleted.id)
    });

    effects.register_after_delete(TypeName::Page, |tx, change| {
        let Some(Record::Page(page)) = &change.before else {
            return Ok(());
        };
        let shapes: Vec<ShapeId> = tx
            .view()
            .shapes_on_page(&page.id)
            .iter()
            .map(|s| s.id.clone())
            .collect();
        tx.run(unlocked(), |tx| {
            for id in shapes {
                if tx.shape(&id).is_some() {
                    tx.delete_one(id)?;
                }
            }
            Ok(())
        })?;

        let camera = CameraId::for_page(&page.id);
        if tx.view().camera(&camera).is_some() {
            tx.delete_one(camera)?;
        }

        let fallback = tx.view().pages().first().map(|p| p.id.clone());
        let Some(fallback) = fallback else {
            return Ok(());
        };
        let stranded: Vec<InstanceId> = tx
            .view()
            .instances()
            .filter(|i| i.current_page_id == page.id)
            .map(|i| i.id.clone())
            .collect();
        for instance in stranded {
            log::debug!("moving {instance} to {fallback}");
            tx.update_instance(&instance, |i| {
                i.current_page_id = fallback.clone();
                i.selected_shape_ids.clear();
            })?;
        }
        Ok(())
    });
}

/// Drop cameras of missing pages, move instances off missing pages and
/// prune missing shapes from selections. Writes directly, without side
/// effects.
pub(super) fn repair_session_records(tx: &mut Transaction<'_>) {
    let view = tx.view();
    let first_page = view.pages().first().map(|p| p.id.clone());
    let stale_cameras: Vec<CameraId> = view
        .of_kind(TypeName::Camera)
        .filter_map(Record::as_camera)
        .filter(|c| c.id.page_id().map_or(true, |page| view.page(&page).is_none()))
        .map(|c| c.id.clone())
        .collect();
    let repaired: Vec<InstanceRecord> = view
        .instances()
        .filter_map(|instance| {
            let mut next = instance.clone();
            if view.page(&next.current_page_id).is_none() {
                if let Some(page) = &first_page {
                    next.current_page_id = page.clone();
                    next.selected_shape_ids.clear();
                }
            }
            next.selected_shape_ids.retain(|id| view.shape(id).is_some());
            (next != *instance).then_some(next)
        })
        .collect();

    for camera in stale_cameras {
        tx.write(camera.into(), None);
    }
    for instance in repaired {
        log::debug!("repaired session record {}", instance.id);
        tx.write(instance.id.clone().into(), Some(instance.into()));
    }
}

fn unlocked() -> TransactionConfig {
    TransactionConfig::default().ignoring_shape_lock()
}

fn with_default_props(schema: &Schema, mut shape: ShapeRecord) -> Result<ShapeRecord> {
    let util = schema
        .shape_util(&shape.shape_type)
        .ok_or_else(|| EditorError::UnknownShapeType(shape.shape_type.clone()))?;
    shape.props = merge_props(util.default_props(), &shape.props);
    Ok(shape)
}

fn remove_children(tx: &mut Transaction<'_>, deleted: &ShapeRecord, policy: ChildDeletePolicy) -> Result<()> {
    let children: Vec<ShapeId> = tx
        .view()
        .children_of(&deleted.id)
        .iter()
        .map(|c| c.id.clone())
        .collect();
    if children.is_empty() {
        return Ok(());
    }
    tx.run(unlocked(), |tx| {
        for child in children {
            if tx.shape(&child).is_none() {
                continue;
            }
            match policy {
                ChildDeletePolicy::Delete => {
                    tx.delete_one(child)?;
                }
                ChildDeletePolicy::Reparent => {
                    tx.update_shape(&child, |c| c.parent_id = deleted.parent_id.clone())?;
                }
            }
        }
        Ok(())
    })
}

fn remove_empty_parent(tx: &mut Transaction<'_>, deleted: &ShapeRecord, schema: &Schema) -> Result<()> {
    let Some(parent_id) = &deleted.parent_id else {
        return Ok(());
    };
    let Some(parent) = tx.shape(parent_id) else {
        return Ok(());
    };
    let removable = schema
        .shape_util(&parent.shape_type)
        .is_some_and(|util| util.delete_when_empty());
    if removable && tx.view().children_of(parent_id).is_empty() {
        let parent_id = parent_id.clone();
        tx.run(unlocked(), |tx| tx.delete_one(parent_id).map(|_| ()))?;
    }
    Ok(())
}

fn deselect(tx: &mut Transaction<'_>, id: &ShapeId) -> Result<()> {
    let instances: Vec<InstanceId> = tx
        .view()
        .instances()
        .filter(|i| i.is_selected(id))
        .map(|i| i.id.clone())
        .collect();
    for instance in instances {
        tx.update_instance(&instance, |i| i.selected_shape_ids.retain(|s| s != id))?;
    }
    Ok(())
}
