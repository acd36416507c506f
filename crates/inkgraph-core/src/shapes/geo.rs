//! Rectangles and ellipses.

use super::{ShapeContext, ShapeUtil};
use crate::records::ShapeRecord;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// The outline drawn inside a geo shape's box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoKind {
    #[default]
    Rectangle,
    Ellipse,
}

impl GeoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GeoKind::Rectangle => "rectangle",
            GeoKind::Ellipse => "ellipse",
        }
    }

    fn of(shape: &ShapeRecord) -> Self {
        match shape.prop_str("geo") {
            Some("ellipse") => GeoKind::Ellipse,
            _ => GeoKind::Rectangle,
        }
    }
}

/// A box of size `w` × `h` from the shape origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoShapeUtil;

impl GeoShapeUtil {
    fn size(shape: &ShapeRecord) -> (f64, f64) {
        (
            shape.prop_f64("w").unwrap_or(0.0).max(0.0),
            shape.prop_f64("h").unwrap_or(0.0).max(0.0),
        )
    }
}

impl ShapeUtil for GeoShapeUtil {
    fn shape_type(&self) -> &'static str {
        "geo"
    }

    fn default_props(&self) -> Value {
        json!({
            "w": 100.0,
            "h": 100.0,
            "geo": GeoKind::Rectangle.as_str(),
            "color": "#000000",
            "fill": "none",
        })
    }

    fn local_bounds(&self, shape: &ShapeRecord, _ctx: ShapeContext<'_>) -> Rect {
        let (w, h) = Self::size(shape);
        Rect::new(0.0, 0.0, w, h)
    }

    fn hit_test(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>, point: Point) -> bool {
        let local = super::page_transform(shape).inverse() * point;
        let bounds = self.local_bounds(shape, ctx);
        match GeoKind::of(shape) {
            GeoKind::Rectangle => bounds.contains(local),
            GeoKind::Ellipse => {
                let (rx, ry) = (bounds.width() / 2.0, bounds.height() / 2.0);
                if rx <= 0.0 || ry <= 0.0 {
                    return false;
                }
                let center = bounds.center();
                let dx = (local.x - center.x) / rx;
                let dy = (local.y - center.y) / ry;
                dx * dx + dy * dy <= 1.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PageId;
    use crate::schema::Schema;
    use crate::store::RecordView;
    use std::collections::HashMap;

    #[test]
    fn test_bounds_and_hit() {
        let records = HashMap::new();
        let schema = Schema::default();
        let ctx = ShapeContext::new(RecordView::new(&records), &schema);
        let shape = ShapeRecord::new("geo", PageId::from_key("p"))
            .at(10.0, 20.0)
            .with_props(json!({ "w": 50.0, "h": 40.0 }));
        let util = GeoShapeUtil;
        assert_eq!(util.page_bounds(&shape, ctx), Rect::new(10.0, 20.0, 60.0, 60.0));
        assert!(util.hit_test(&shape, ctx, Point::new(11.0, 21.0)));
        assert!(!util.hit_test(&shape, ctx, Point::new(61.0, 21.0)));
    }

    #[test]
    fn test_ellipse_hit_excludes_corners() {
        let records = HashMap::new();
        let schema = Schema::default();
        let ctx = ShapeContext::new(RecordView::new(&records), &schema);
        let shape = ShapeRecord::new("geo", PageId::from_key("p"))
            .with_props(json!({ "w": 100.0, "h": 100.0, "geo": "ellipse" }));
        let util = GeoShapeUtil;
        assert!(util.hit_test(&shape, ctx, Point::new(50.0, 50.0)));
        assert!(!util.hit_test(&shape, ctx, Point::new(2.0, 2.0)));
    }
}
