//! Arrow shape: a segment between two terminals.

use super::{page_transform, ShapeContext, ShapeUtil, HIT_TOLERANCE};
use crate::records::ShapeRecord;
use kurbo::{Point, Rect};
use serde_json::{json, Value};

/// Arrows store `start` and `end` as `{x, y}` offsets from the shape origin.
/// A terminal may be kept attached to another shape by an `arrow` binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowShapeUtil;

impl ArrowShapeUtil {
    /// A terminal in shape-local space.
    pub fn terminal(shape: &ShapeRecord, name: &str) -> Point {
        let point = shape.props.get(name);
        let coord = |axis: &str| point.and_then(|p| p.get(axis)).and_then(Value::as_f64).unwrap_or(0.0);
        Point::new(coord("x"), coord("y"))
    }

    /// A terminal in page space.
    pub fn page_terminal(shape: &ShapeRecord, name: &str) -> Point {
        page_transform(shape) * Self::terminal(shape, name)
    }
}

impl ShapeUtil for ArrowShapeUtil {
    fn shape_type(&self) -> &'static str {
        "arrow"
    }

    fn default_props(&self) -> Value {
        json!({
            "start": { "x": 0.0, "y": 0.0 },
            "end": { "x": 100.0, "y": 0.0 },
            "color": "#000000",
        })
    }

    fn local_bounds(&self, shape: &ShapeRecord, _ctx: ShapeContext<'_>) -> Rect {
        Rect::from_points(Self::terminal(shape, "start"), Self::terminal(shape, "end"))
    }

    fn hit_test(&self, shape: &ShapeRecord, _ctx: ShapeContext<'_>, point: Point) -> bool {
        let a = Self::page_terminal(shape, "start");
        let b = Self::page_terminal(shape, "end");
        let ab = b - a;
        let len_sq = ab.hypot2();
        let t = if len_sq == 0.0 {
            0.0
        } else {
            ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0)
        };
        let nearest = a + ab * t;
        (point - nearest).hypot() <= HIT_TOLERANCE
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
    fn test_hit_near_segment() {
        let records = HashMap::new();
        let schema = Schema::default();
        let ctx = ShapeContext::new(RecordView::new(&records), &schema);
        let shape = ShapeRecord::new("arrow", PageId::from_key("p"))
            .at(100.0, 100.0)
            .with_props(json!({ "start": { "x": 0.0, "y": 0.0 }, "end": { "x": 100.0, "y": 0.0 } }));
        let util = ArrowShapeUtil;
        assert!(util.hit_test(&shape, ctx, Point::new(150.0, 102.0)));
        assert!(!util.hit_test(&shape, ctx, Point::new(150.0, 110.0)));
        assert_eq!(util.page_bounds(&shape, ctx), Rect::new(100.0, 100.0, 200.0, 100.0));
    }
}
