//! Read-only access to a set of records.

use crate::records::{
    BindingId, BindingRecord, CameraId, CameraRecord, InstanceId, InstanceRecord, PageId, PageRecord,
    Record, RecordId, ShapeId, ShapeRecord, TypeName,
};
use std::collections::HashMap;

/// A borrowed, read-only view of the store contents.
///
/// Handed to before-handlers and computed values, and available inside a
/// transaction through [`Transaction::view`](super::Transaction::view).
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    records: &'a HashMap<RecordId, Record>,
}

impl<'a> RecordView<'a> {
    pub(crate) fn new(records: &'a HashMap<RecordId, Record>) -> Self {
        Self { records }
    }

    pub fn get(&self, id: &RecordId) -> Option<&'a Record> {
        self.records.get(id)
    }

    pub fn has(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn shape(&self, id: &ShapeId) -> Option<&'a ShapeRecord> {
        self.get(&id.into()).and_then(Record::as_shape)
    }

    pub fn binding(&self, id: &BindingId) -> Option<&'a BindingRecord> {
        self.get(&id.into()).and_then(Record::as_binding)
    }

    pub fn page(&self, id: &PageId) -> Option<&'a PageRecord> {
        self.get(&id.into()).and_then(Record::as_page)
    }

    pub fn camera(&self, id: &CameraId) -> Option<&'a CameraRecord> {
        self.get(&id.into()).and_then(Record::as_camera)
    }

    pub fn instance(&self, id: &InstanceId) -> Option<&'a InstanceRecord> {
        self.get(&id.into()).and_then(Record::as_instance)
    }

    /// All records, in no particular order.
    pub fn records(self) -> impl Iterator<Item = &'a Record> {
        self.records.values()
    }

    pub fn of_kind(self, kind: TypeName) -> impl Iterator<Item = &'a Record> {
        self.records.values().filter(move |r| r.type_name() == kind)
    }

    pub fn shapes(self) -> impl Iterator<Item = &'a ShapeRecord> {
        self.records.values().filter_map(Record::as_shape)
    }

    pub fn bindings(self) -> impl Iterator<Item = &'a BindingRecord> {
        self.records.values().filter_map(Record::as_binding)
    }

    pub fn instances(self) -> impl Iterator<Item = &'a InstanceRecord> {
        self.records.values().filter_map(Record::as_instance)
    }

    /// Pages ordered by index, then id.
    pub fn pages(&self) -> Vec<&'a PageRecord> {
        let mut pages: Vec<&PageRecord> = self.records.values().filter_map(Record::as_page).collect();
        pages.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        pages
    }

    /// Shapes of a page, back to front.
    pub fn shapes_on_page(&self, page: &PageId) -> Vec<&'a ShapeRecord> {
        let mut shapes: Vec<&ShapeRecord> = self.shapes().filter(|s| &s.page_id == page).collect();
        shapes.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        shapes
    }

    /// Direct children of a shape, back to front.
    pub fn children_of(&self, parent: &ShapeId) -> Vec<&'a ShapeRecord> {
        let mut children: Vec<&ShapeRecord> = self
            .shapes()
            .filter(|s| s.parent_id.as_ref() == Some(parent))
            .collect();
        children.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.id.cmp(&b.id)));
        children
    }

    /// Bindings with `shape` as either endpoint.
    pub fn bindings_involving(&self, shape: &ShapeId) -> Vec<&'a BindingRecord> {
        let mut bindings: Vec<&BindingRecord> = self.bindings().filter(|b| b.touches(shape)).collect();
        bindings.sort_by(|a, b| a.id.cmp(&b.id));
        bindings
    }

    /// Whether the shape or any ancestor has `is_locked` set.
    pub fn is_shape_or_ancestor_locked(&self, id: &ShapeId) -> bool {
        let mut current = self.shape(id);
        let mut steps = 0;
        while let Some(shape) = current {
            if shape.is_locked {
                return true;
            }
            steps += 1;
            if steps > self.records.len() {
                break;
            }
            current = shape.parent_id.as_ref().and_then(|parent| self.shape(parent));
        }
        false
    }

    /// The index that puts a new shape in front of everything on `page`.
    pub fn next_shape_index(&self, page: &PageId) -> i64 {
        self.shapes()
            .filter(|s| &s.page_id == page)
            .map(|s| s.index)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// The index that puts a new page after every existing page.
    pub fn next_page_index(&self) -> i64 {
        self.pages().last().map_or(1, |page| page.index + 1)
    }
}
