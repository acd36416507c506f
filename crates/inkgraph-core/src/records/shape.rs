//! Shape records.

use super::{PageId, ShapeId};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A shape on a page.
///
/// `x` and `y` are page coordinates of the shape's origin (its top-left
/// corner for box-like shapes). `props` holds the kind-specific payload; the
/// registered [`ShapeUtil`](crate::shapes::ShapeUtil) for `shape_type` fills
/// in missing props on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    pub id: ShapeId,
    #[serde(rename = "type")]
    pub shape_type: String,
    pub page_id: PageId,
    #[serde(default)]
    pub parent_id: Option<ShapeId>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    /// Z-order key within the page, back to front.
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default = "empty_object")]
    pub props: Value,
    #[serde(default = "empty_object")]
    pub meta: Value,
}

fn default_opacity() -> f64 {
    1.0
}

pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ShapeRecord {
    /// A new shape of `shape_type` on `page`, at the origin, with empty props.
    pub fn new(shape_type: impl Into<String>, page_id: PageId) -> Self {
        Self {
            id: ShapeId::new(),
            shape_type: shape_type.into(),
            page_id,
            parent_id: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            index: 0,
            is_locked: false,
            opacity: default_opacity(),
            props: empty_object(),
            meta: empty_object(),
        }
    }

    pub fn with_id(mut self, id: ShapeId) -> Self {
        self.id = id;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_parent(mut self, parent: ShapeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    pub fn locked(mut self) -> Self {
        self.is_locked = true;
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Read a numeric prop.
    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        self.props.get(key).and_then(Value::as_f64)
    }

    /// Read a string prop.
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// Set a prop, turning `props` into an object if it is not one yet.
    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) {
        if !self.props.is_object() {
            self.props = empty_object();
        }
        if let Value::Object(map) = &mut self.props {
            map.insert(key.to_string(), value.into());
        }
    }
}

/// Overlay `props` onto `defaults`, keeping every default the caller did not
/// provide. Non-object props are replaced by the defaults.
pub(crate) fn merge_props(defaults: Value, props: &Value) -> Value {
    match (defaults, props) {
        (Value::Object(mut base), Value::Object(given)) => {
            for (key, value) in given {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (defaults, Value::Null) => defaults,
        (Value::Object(base), _) => Value::Object(base),
        (_, given) => given.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let page = PageId::from_key("p");
        let shape = ShapeRecord::new("geo", page.clone())
            .at(10.0, 20.0)
            .with_props(json!({ "w": 5.0 }));
        assert_eq!(shape.position(), Point::new(10.0, 20.0));
        assert_eq!(shape.prop_f64("w"), Some(5.0));
        assert_eq!(shape.page_id, page);
    }

    #[test]
    fn test_serializes_camel_case() {
        let shape = ShapeRecord::new("geo", PageId::from_key("p")).with_id(ShapeId::from_key("s"));
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["type"], "geo");
        assert_eq!(value["pageId"], "page:p");
        assert_eq!(value["isLocked"], false);
        assert!(value["parentId"].is_null());
    }

    #[test]
    fn test_merge_props() {
        let merged = merge_props(json!({ "w": 100.0, "h": 100.0 }), &json!({ "w": 5.0 }));
        assert_eq!(merged, json!({ "w": 5.0, "h": 100.0 }));
        let untouched = merge_props(json!({ "w": 1.0 }), &Value::Null);
        assert_eq!(untouched, json!({ "w": 1.0 }));
    }

    #[test]
    fn test_set_prop_on_non_object() {
        let mut shape = ShapeRecord::new("geo", PageId::from_key("p")).with_props(Value::Null);
        shape.set_prop("color", "red");
        assert_eq!(shape.prop_str("color"), Some("red"));
    }
}
