//! Editor configuration.

use crate::camera::CameraOptions;
use crate::error::Result;
use kurbo::Rect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings fixed for the lifetime of one editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorOptions {
    /// Maximum number of undo entries kept; unbounded if unset.
    pub max_history: Option<usize>,
    /// Screen distance the pointer must travel before a press becomes a drag.
    pub drag_distance: f64,
    /// How long a released modifier still counts as held, in milliseconds.
    pub modifier_decay_ms: u64,
    /// Quiet time after which a moving camera is idle again, in milliseconds.
    pub camera_settle_ms: u64,
    pub camera: CameraOptions,
    /// Initial viewport in screen space.
    pub viewport: Rect,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            max_history: None,
            drag_distance: 4.0,
            modifier_decay_ms: 150,
            camera_settle_ms: 64,
            camera: CameraOptions::default(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 720.0),
        }
    }
}

impl EditorOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn modifier_decay(&self) -> Duration {
        Duration::from_millis(self.modifier_decay_ms)
    }

    pub fn camera_settle(&self) -> Duration {
        Duration::from_millis(self.camera_settle_ms)
    }
}
