//! Registry of shape and binding kinds.

use crate::bindings::{ArrowBindingUtil, BindingUtil};
use crate::records::ShapeRecord;
use crate::shapes::{ArrowShapeUtil, GeoShapeUtil, GroupShapeUtil, ShapeContext, ShapeUtil};
use crate::store::RecordView;
use kurbo::Rect;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The shape and binding kinds a store accepts.
///
/// `Schema::default()` registers `geo`, `arrow` and `group` shapes and the
/// `arrow` binding. `Schema::new()` is empty.
#[derive(Clone)]
pub struct Schema {
    shape_utils: HashMap<String, Arc<dyn ShapeUtil>>,
    binding_utils: HashMap<String, Arc<dyn BindingUtil>>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("shape_types", &self.shape_types())
            .field("binding_types", &self.binding_types())
            .finish()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
            .with_shape_util(GeoShapeUtil)
            .with_shape_util(ArrowShapeUtil)
            .with_shape_util(GroupShapeUtil)
            .with_binding_util(ArrowBindingUtil)
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            shape_utils: HashMap::new(),
            binding_utils: HashMap::new(),
        }
    }

    /// Register a shape kind, replacing any util with the same type.
    pub fn with_shape_util(mut self, util: impl ShapeUtil + 'static) -> Self {
        self.shape_utils.insert(util.shape_type().to_string(), Arc::new(util));
        self
    }

    /// Register a binding kind, replacing any util with the same type.
    pub fn with_binding_util(mut self, util: impl BindingUtil + 'static) -> Self {
        self.binding_utils.insert(util.binding_type().to_string(), Arc::new(util));
        self
    }

    pub fn shape_util(&self, shape_type: &str) -> Option<&Arc<dyn ShapeUtil>> {
        self.shape_utils.get(shape_type)
    }

    pub fn binding_util(&self, binding_type: &str) -> Option<&Arc<dyn BindingUtil>> {
        self.binding_utils.get(binding_type)
    }

    pub fn shape_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.shape_utils.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn binding_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.binding_utils.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Page bounds of `shape`, or `None` for an unregistered type.
    pub fn shape_page_bounds(&self, view: RecordView<'_>, shape: &ShapeRecord) -> Option<Rect> {
        ShapeContext::new(view, self).page_bounds(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kinds() {
        let schema = Schema::default();
        assert_eq!(schema.shape_types(), vec!["arrow", "geo", "group"]);
        assert_eq!(schema.binding_types(), vec!["arrow"]);
        assert!(schema.shape_util("text").is_none());
        assert!(Schema::new().shape_types().is_empty());
    }
}
