//! Binding records: typed, directed edges between two shapes.

use super::shape::empty_object;
use super::{BindingId, ShapeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRecord {
    pub id: BindingId,
    #[serde(rename = "type")]
    pub binding_type: String,
    pub from_id: ShapeId,
    pub to_id: ShapeId,
    #[serde(default = "empty_object")]
    pub props: Value,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

impl BindingRecord {
    pub fn new(binding_type: impl Into<String>, from_id: ShapeId, to_id: ShapeId) -> Self {
        Self {
            id: BindingId::new(),
            binding_type: binding_type.into(),
            from_id,
            to_id,
            props: empty_object(),
            meta: empty_object(),
        }
    }

    pub fn with_id(mut self, id: BindingId) -> Self {
        self.id = id;
        self
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    /// Whether `shape` is either endpoint.
    pub fn touches(&self, shape: &ShapeId) -> bool {
        &self.from_id == shape || &self.to_id == shape
    }
}
