//! Geo tool: click to drop a shape, drag to draw one.

use crate::editor::EditorCore;
use crate::error::Result;
use crate::history::MarkId;
use crate::input::{EventInfo, InputEvent};
use crate::records::ShapeId;
use crate::shapes::set_shape_color;
use crate::statechart::{EventOutcome, StateBehavior, StateContext, Target};
use kurbo::Point;

/// Size of a shape dropped with a click.
const DEFAULT_SIZE: f64 = 100.0;

fn is_escape(info: &EventInfo) -> bool {
    matches!(&info.event, InputEvent::KeyDown { key, .. } if key == "Escape")
}

/// Create a geo shape of the editor's next kind with its top-left corner at
/// `origin`, and select it.
fn create_geo(editor: &mut EditorCore, origin: Point, w: f64, h: f64) -> Result<ShapeId> {
    let color = editor.preferences().get().color;
    let mut shape = editor.new_shape("geo")?.at(origin.x, origin.y);
    shape.set_prop("w", w);
    shape.set_prop("h", h);
    shape.set_prop("geo", editor.next_geo().as_str());
    set_shape_color(&mut shape, color.into());
    let id = editor.create_shape(shape)?;
    editor.select(std::slice::from_ref(&id))?;
    Ok(id)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoIdle;

impl StateBehavior for GeoIdle {
    fn on_event(&self, _ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match info.event {
            InputEvent::PointerDown { .. } => Ok(EventOutcome::Transition(Target::sibling("pointing"))),
            _ if is_escape(info) => Ok(EventOutcome::Transition(Target::absolute("root.select"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}

/// Pointer pressed; a release drops a default-size shape, a drag draws one.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoPointing;

impl StateBehavior for GeoPointing {
    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match info.event {
            InputEvent::PointerMove { .. } if info.is_dragging => {
                Ok(EventOutcome::Transition(Target::sibling("drawing")))
            }
            InputEvent::PointerUp { .. } | InputEvent::Complete => {
                let half = DEFAULT_SIZE / 2.0;
                let origin = Point::new(info.origin_page_point.x - half, info.origin_page_point.y - half);
                ctx.editor.mark_history_stopping_point();
                create_geo(ctx.editor, origin, DEFAULT_SIZE, DEFAULT_SIZE)?;
                Ok(EventOutcome::Transition(Target::absolute("root.select.idle")))
            }
            InputEvent::Cancel => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ if is_escape(info) => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}

#[derive(Debug)]
struct Drawing {
    mark: MarkId,
    id: ShapeId,
    completed: bool,
}

/// Sizing a new shape between the gesture origin and the pointer. Shift
/// keeps it square.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoDrawing;

impl GeoDrawing {
    fn resize(editor: &mut EditorCore, id: &ShapeId, info: &EventInfo) -> Result<()> {
        let origin = info.origin_page_point;
        let point = info.page_point;
        let mut w = (point.x - origin.x).abs().max(1.0);
        let mut h = (point.y - origin.y).abs().max(1.0);
        if info.modifiers.shift {
            w = w.max(h);
            h = w;
        }
        let x = if point.x < origin.x { origin.x - w } else { origin.x };
        let y = if point.y < origin.y { origin.y - h } else { origin.y };
        editor.update_shape(id, |shape| {
            shape.x = x;
            shape.y = y;
            shape.set_prop("w", w);
            shape.set_prop("h", h);
        })?;
        Ok(())
    }
}

impl StateBehavior for GeoDrawing {
    fn on_enter(&self, ctx: &mut StateContext<'_>, info: Option<&EventInfo>) -> Result<()> {
        let mark = ctx.editor.mark_history_stopping_point();
        let origin = info.map_or_else(|| ctx.editor.input().origin_page(), |i| i.origin_page_point);
        let id = create_geo(ctx.editor, origin, 1.0, 1.0)?;
        if let Some(info) = info {
            Self::resize(ctx.editor, &id, info)?;
        }
        ctx.data.set(Drawing {
            mark,
            id,
            completed: false,
        });
        Ok(())
    }

    fn on_exit(&self, ctx: &mut StateContext<'_>, _info: Option<&EventInfo>) -> Result<()> {
        if let Some(drawing) = ctx.data.take::<Drawing>() {
            if !drawing.completed {
                ctx.editor.bail_to_mark(drawing.mark)?;
            }
        }
        Ok(())
    }

    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        let Some(drawing) = ctx.data.get_mut::<Drawing>() else {
            return Ok(EventOutcome::Transition(Target::sibling("idle")));
        };
        match info.event {
            InputEvent::PointerMove { .. } => {
                Self::resize(ctx.editor, &drawing.id, info)?;
                Ok(EventOutcome::Halt)
            }
            InputEvent::PointerUp { .. } | InputEvent::Complete => {
                if matches!(info.event, InputEvent::PointerUp { .. }) {
                    Self::resize(ctx.editor, &drawing.id, info)?;
                }
                drawing.completed = true;
                Ok(EventOutcome::Transition(Target::absolute("root.select.idle")))
            }
            InputEvent::Cancel => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ if is_escape(info) => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}
