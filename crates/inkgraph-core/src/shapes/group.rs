//! Group shape for combining multiple shapes.

use super::{ShapeContext, ShapeUtil};
use crate::records::ShapeRecord;
use kurbo::{Point, Rect, Vec2};
use serde_json::{json, Value};

/// A group has no geometry of its own: its bounds are the union of its
/// children's, and it is hit when any child is hit. A group left without
/// children is deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupShapeUtil;

impl ShapeUtil for GroupShapeUtil {
    fn shape_type(&self) -> &'static str {
        "group"
    }

    fn default_props(&self) -> Value {
        json!({})
    }

    fn local_bounds(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>) -> Rect {
        self.page_bounds(shape, ctx) - Vec2::new(shape.x, shape.y)
    }

    fn page_bounds(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>) -> Rect {
        ctx.view
            .children_of(&shape.id)
            .into_iter()
            .filter_map(|child| ctx.page_bounds(child))
            .reduce(|acc, bounds| acc.union(bounds))
            .unwrap_or_else(|| Rect::from_origin_size(shape.position(), (0.0, 0.0)))
    }

    fn hit_test(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>, point: Point) -> bool {
        ctx.view.children_of(&shape.id).into_iter().any(|child| {
            ctx.schema
                .shape_util(&child.shape_type)
                .is_some_and(|util| util.hit_test(child, ctx, point))
        })
    }

    fn delete_when_empty(&self) -> bool {
        true
    }
}
