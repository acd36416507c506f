//! Pages and the per-page / per-instance session records.

use super::shape::empty_object;
use super::{CameraId, InstanceId, PageId, ShapeId};
use crate::camera::Camera;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub id: PageId,
    pub name: String,
    #[serde(default)]
    pub index: i64,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

impl PageRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            name: name.into(),
            index: 0,
            meta: empty_object(),
        }
    }

    pub fn with_id(mut self, id: PageId) -> Self {
        self.id = id;
        self
    }
}

/// Camera transform of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub id: CameraId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

impl CameraRecord {
    pub fn for_page(page: &PageId) -> Self {
        Self {
            id: CameraId::for_page(page),
            x: 0.0,
            y: 0.0,
            z: 1.0,
            meta: empty_object(),
        }
    }

    pub fn camera(&self) -> Camera {
        Camera::new(self.x, self.y, self.z)
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.x = camera.x;
        self.y = camera.y;
        self.z = camera.z;
    }
}

/// Ephemeral state of one running editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub current_page_id: PageId,
    #[serde(default)]
    pub selected_shape_ids: Vec<ShapeId>,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

impl InstanceRecord {
    pub fn new(current_page_id: PageId) -> Self {
        Self {
            id: InstanceId::new(),
            current_page_id,
            selected_shape_ids: Vec::new(),
            is_read_only: false,
            meta: empty_object(),
        }
    }

    pub fn is_selected(&self, id: &ShapeId) -> bool {
        self.selected_shape_ids.contains(id)
    }
}
