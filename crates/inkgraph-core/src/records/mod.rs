//! Record definitions.
//!
//! Records are plain serializable values. The store never hands out mutable
//! references to them: changing a record means putting a new value under
//! the same id inside a transaction.

mod binding;
mod id;
mod page;
mod shape;

pub use binding::BindingRecord;
pub use id::{BindingId, CameraId, InstanceId, PageId, RecordId, RecordScope, ShapeId, TypeName};
pub use page::{CameraRecord, InstanceRecord, PageRecord};
pub use shape::ShapeRecord;
pub(crate) use shape::merge_props;

use serde::{Deserialize, Serialize};

/// Any record held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typeName", rename_all = "snake_case")]
pub enum Record {
    Shape(ShapeRecord),
    Binding(BindingRecord),
    Page(PageRecord),
    Camera(CameraRecord),
    Instance(InstanceRecord),
}

/// A referential field of a record: `(field name, target id, expected kind)`.
pub type Reference = (&'static str, RecordId, TypeName);

impl Record {
    pub fn id(&self) -> RecordId {
        match self {
            Record::Shape(r) => r.id.clone().into(),
            Record::Binding(r) => r.id.clone().into(),
            Record::Page(r) => r.id.clone().into(),
            Record::Camera(r) => r.id.clone().into(),
            Record::Instance(r) => r.id.clone().into(),
        }
    }

    pub fn type_name(&self) -> TypeName {
        match self {
            Record::Shape(_) => TypeName::Shape,
            Record::Binding(_) => TypeName::Binding,
            Record::Page(_) => TypeName::Page,
            Record::Camera(_) => TypeName::Camera,
            Record::Instance(_) => TypeName::Instance,
        }
    }

    pub fn scope(&self) -> RecordScope {
        self.type_name().scope()
    }

    pub fn as_shape(&self) -> Option<&ShapeRecord> {
        match self {
            Record::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<&BindingRecord> {
        match self {
            Record::Binding(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn as_page(&self) -> Option<&PageRecord> {
        match self {
            Record::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&CameraRecord> {
        match self {
            Record::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&InstanceRecord> {
        match self {
            Record::Instance(instance) => Some(instance),
            _ => None,
        }
    }

    /// Every id this record points at, with the kind it must resolve to.
    pub fn references(&self) -> Vec<Reference> {
        match self {
            Record::Shape(shape) => {
                let mut refs = vec![("pageId", shape.page_id.clone().into(), TypeName::Page)];
                if let Some(parent) = &shape.parent_id {
                    refs.push(("parentId", parent.clone().into(), TypeName::Shape));
                }
                refs
            }
            Record::Binding(binding) => vec![
                ("fromId", binding.from_id.clone().into(), TypeName::Shape),
                ("toId", binding.to_id.clone().into(), TypeName::Shape),
            ],
            Record::Page(_) => Vec::new(),
            Record::Camera(camera) => match camera.id.page_id() {
                Ok(page) => vec![("id", page.into(), TypeName::Page)],
                Err(_) => Vec::new(),
            },
            Record::Instance(instance) => {
                let mut refs = vec![(
                    "currentPageId",
                    instance.current_page_id.clone().into(),
                    TypeName::Page,
                )];
                refs.extend(
                    instance
                        .selected_shape_ids
                        .iter()
                        .map(|id| ("selectedShapeIds", id.clone().into(), TypeName::Shape)),
                );
                refs
            }
        }
    }
}

impl From<ShapeRecord> for Record {
    fn from(record: ShapeRecord) -> Self {
        Record::Shape(record)
    }
}

impl From<BindingRecord> for Record {
    fn from(record: BindingRecord) -> Self {
        Record::Binding(record)
    }
}

impl From<PageRecord> for Record {
    fn from(record: PageRecord) -> Self {
        Record::Page(record)
    }
}

impl From<CameraRecord> for Record {
    fn from(record: CameraRecord) -> Self {
        Record::Camera(record)
    }
}

impl From<InstanceRecord> for Record {
    fn from(record: InstanceRecord) -> Self {
        Record::Instance(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_json_roundtrip() {
        let page = PageId::from_key("p");
        let shape = ShapeRecord::new("geo", page)
            .with_id(ShapeId::from_key("a"))
            .at(1.0, 2.0)
            .with_props(json!({ "w": 10.0 }));
        let record = Record::from(shape);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"typeName\":\"shape\""));
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_references() {
        let binding = BindingRecord::new("arrow", ShapeId::from_key("a"), ShapeId::from_key("b"));
        let refs = Record::from(binding).references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].0, "toId");
        assert_eq!(refs[1].2, TypeName::Shape);

        let camera = CameraRecord::for_page(&PageId::from_key("p"));
        let refs = Record::from(camera).references();
        assert_eq!(refs[0].1.as_str(), "page:p");
    }

    #[test]
    fn test_scope() {
        let page = Record::from(PageRecord::new("Page 1"));
        assert_eq!(page.scope(), RecordScope::Document);
        let instance = Record::from(InstanceRecord::new(PageId::from_key("p")));
        assert_eq!(instance.scope(), RecordScope::Session);
    }
}
