//! Shape kinds and their geometry.
//!
//! A shape record is plain data; what a `type` means (its default props, its
//! bounds, how it is hit) is provided by a [`ShapeUtil`] registered in the
//! [`Schema`](crate::schema::Schema).

mod arrow;
mod geo;
mod group;

pub use arrow::ArrowShapeUtil;
pub use geo::{GeoKind, GeoShapeUtil};
pub use group::GroupShapeUtil;

use crate::records::ShapeRecord;
use crate::schema::Schema;
use crate::store::RecordView;
use kurbo::{Affine, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hit tolerance in page units for thin shapes.
pub const HIT_TOLERANCE: f64 = 4.0;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// `#rrggbb`, or `#rrggbbaa` when not opaque. This is how colors are
    /// stored in shape props.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, 255)),
            8 => Some(Self::new(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// The `color` prop of a shape, if it holds a valid hex color.
pub fn shape_color(shape: &ShapeRecord) -> Option<Color> {
    shape
        .prop_str("color")
        .and_then(SerializableColor::from_hex)
        .map(Color::from)
}

/// Set the `color` prop of a shape from a peniko color.
pub fn set_shape_color(shape: &mut ShapeRecord, color: Color) {
    shape.set_prop("color", SerializableColor::from(color).to_hex());
}

/// What a shape util may look at while computing geometry.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub view: RecordView<'a>,
    pub schema: &'a Schema,
}

impl<'a> ShapeContext<'a> {
    pub fn new(view: RecordView<'a>, schema: &'a Schema) -> Self {
        Self { view, schema }
    }

    /// Page bounds of any shape, dispatched to its util.
    pub fn page_bounds(&self, shape: &ShapeRecord) -> Option<Rect> {
        self.schema
            .shape_util(&shape.shape_type)
            .map(|util| util.page_bounds(shape, *self))
    }
}

/// Shape-local to page transform: rotation about the origin, then
/// translation to `(x, y)`.
pub fn page_transform(shape: &ShapeRecord) -> Affine {
    Affine::translate(Vec2::new(shape.x, shape.y)) * Affine::rotate(shape.rotation)
}

/// Behavior of one shape kind.
pub trait ShapeUtil: Send + Sync {
    /// The `type` string this util handles.
    fn shape_type(&self) -> &'static str;

    /// Props filled in when a shape is created without them.
    fn default_props(&self) -> Value;

    /// Bounds in shape-local space.
    fn local_bounds(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>) -> Rect;

    /// Axis-aligned bounds in page space.
    fn page_bounds(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>) -> Rect {
        page_transform(shape).transform_rect_bbox(self.local_bounds(shape, ctx))
    }

    /// Whether `point` (page space) hits the shape.
    fn hit_test(&self, shape: &ShapeRecord, ctx: ShapeContext<'_>, point: Point) -> bool {
        let local = page_transform(shape).inverse() * point;
        self.local_bounds(shape, ctx).contains(local)
    }

    /// Whether the shape is removed once its last child is deleted.
    fn delete_when_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = SerializableColor::new(0x1e, 0x90, 0xff, 255);
        assert_eq!(color.to_hex(), "#1e90ff");
        assert_eq!(SerializableColor::from_hex("#1e90ff"), Some(color));
        assert_eq!(
            SerializableColor::from_hex("#1e90ff80"),
            Some(SerializableColor::new(0x1e, 0x90, 0xff, 0x80))
        );
        assert_eq!(SerializableColor::from_hex("1e90ff"), None);
        assert_eq!(SerializableColor::from_hex("#zz90ff"), None);
    }

    #[test]
    fn test_peniko_conversion() {
        let color: Color = SerializableColor::new(10, 20, 30, 255).into();
        assert_eq!(SerializableColor::from(color), SerializableColor::new(10, 20, 30, 255));
    }

    #[test]
    fn test_page_transform_rotates_about_origin() {
        let mut shape = ShapeRecord::new("geo", crate::records::PageId::from_key("p")).at(10.0, 10.0);
        shape.rotation = std::f64::consts::FRAC_PI_2;
        let p = page_transform(&shape) * Point::new(1.0, 0.0);
        assert!((p.x - 10.0).abs() < 1e-9);
        assert!((p.y - 11.0).abs() < 1e-9);
    }
}
