//! Arrow bindings: keep an arrow terminal attached to another shape.

use super::BindingUtil;
use crate::error::{EditorError, Result};
use crate::records::{BindingRecord, ShapeRecord};
use crate::schema::Schema;
use crate::shapes::page_transform;
use crate::store::Transaction;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Which end of the arrow is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowTerminal {
    Start,
    #[default]
    End,
}

impl ArrowTerminal {
    pub fn as_str(self) -> &'static str {
        match self {
            ArrowTerminal::Start => "start",
            ArrowTerminal::End => "end",
        }
    }

    fn of(binding: &BindingRecord) -> Self {
        match binding.props.get("terminal").and_then(Value::as_str) {
            Some("start") => ArrowTerminal::Start,
            _ => ArrowTerminal::End,
        }
    }
}

/// Binds an arrow (`from`) to a target shape (`to`).
///
/// Props: `terminal` (`"start"` or `"end"`) and `normalizedAnchor`, the
/// attachment point as a fraction of the target's page bounds. Whenever the
/// binding or the target changes, the terminal is moved onto the anchor.
/// When the target is deleted the binding goes away and the terminal stays
/// where it was.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowBindingUtil;

impl ArrowBindingUtil {
    /// Props for a binding of `terminal` to `anchor`.
    pub fn props(terminal: ArrowTerminal, anchor: Point) -> Value {
        json!({
            "terminal": terminal.as_str(),
            "normalizedAnchor": { "x": anchor.x, "y": anchor.y },
        })
    }

    fn anchor(binding: &BindingRecord) -> Point {
        let anchor = binding.props.get("normalizedAnchor");
        let coord = |axis: &str| anchor.and_then(|a| a.get(axis)).and_then(Value::as_f64).unwrap_or(0.5);
        Point::new(coord("x"), coord("y"))
    }

    fn attach(&self, tx: &mut Transaction<'_>, schema: &Schema, binding: &BindingRecord) -> Result<()> {
        let Some(arrow) = tx.shape(&binding.from_id).cloned() else {
            return Ok(());
        };
        if arrow.shape_type != "arrow" {
            return Err(EditorError::InvalidRecord {
                id: binding.id.clone().into(),
                reason: format!("arrow binding starts at a `{}` shape", arrow.shape_type),
            });
        }
        let Some(target) = tx.shape(&binding.to_id) else {
            return Ok(());
        };
        let Some(bounds) = schema.shape_page_bounds(tx.view(), target) else {
            return Ok(());
        };
        let anchor = Self::anchor(binding);
        let page_point = Point::new(
            bounds.x0 + bounds.width() * anchor.x,
            bounds.y0 + bounds.height() * anchor.y,
        );
        let local = page_transform(&arrow).inverse() * page_point;
        let terminal = ArrowTerminal::of(binding);
        tx.update_shape(&arrow.id, |a| {
            a.set_prop(terminal.as_str(), json!({ "x": local.x, "y": local.y }));
        })?;
        Ok(())
    }
}

impl BindingUtil for ArrowBindingUtil {
    fn binding_type(&self) -> &'static str {
        "arrow"
    }

    fn default_props(&self) -> Value {
        Self::props(ArrowTerminal::End, Point::new(0.5, 0.5))
    }

    fn on_after_create(&self, tx: &mut Transaction<'_>, schema: &Schema, binding: &BindingRecord) -> Result<()> {
        self.attach(tx, schema, binding)
    }

    fn on_after_change(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        _prev: &BindingRecord,
        next: &BindingRecord,
    ) -> Result<()> {
        self.attach(tx, schema, next)
    }

    fn on_after_change_to_shape(
        &self,
        tx: &mut Transaction<'_>,
        schema: &Schema,
        binding: &BindingRecord,
        _prev: &ShapeRecord,
        _next: &ShapeRecord,
    ) -> Result<()> {
        self.attach(tx, schema, binding)
    }
}
