//! Select tool: click to select, drag to move, drag on the canvas to brush.

use crate::editor::EditorCore;
use crate::error::Result;
use crate::history::MarkId;
use crate::input::{EventInfo, EventTarget, InputEvent, MouseButton};
use crate::records::ShapeId;
use crate::snap::{snap_translation, GRID_SIZE};
use crate::statechart::{EventOutcome, StateBehavior, StateContext, Target};
use crate::store::TransactionConfig;
use kurbo::{Point, Rect};

fn is_escape(info: &EventInfo) -> bool {
    matches!(&info.event, InputEvent::KeyDown { key, .. } if key == "Escape")
}

/// Waiting for input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectIdle;

impl StateBehavior for SelectIdle {
    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        let editor = &mut *ctx.editor;
        match &info.event {
            InputEvent::PointerDown {
                button: MouseButton::Left,
                ..
            } => match &info.target {
                EventTarget::Shape(id) => {
                    if info.modifiers.shift {
                        let mut ids = editor.selected_shape_ids();
                        match ids.iter().position(|s| s == id) {
                            Some(pos) => {
                                ids.remove(pos);
                            }
                            None => ids.push(id.clone()),
                        }
                        editor.select(&ids)?;
                    } else if !editor.selected_shape_ids().contains(id) {
                        editor.select(std::slice::from_ref(id))?;
                    }
                    Ok(EventOutcome::Transition(Target::sibling("pointing_shape")))
                }
                EventTarget::Canvas => {
                    if !info.modifiers.shift {
                        editor.select_none()?;
                    }
                    Ok(EventOutcome::Transition(Target::sibling("brushing")))
                }
            },
            InputEvent::KeyDown { key, .. } => match key.as_str() {
                "Escape" => {
                    editor.select_none()?;
                    Ok(EventOutcome::Halt)
                }
                "Delete" | "Backspace" => {
                    let ids = editor.selected_shape_ids();
                    if !ids.is_empty() {
                        editor.mark_history_stopping_point();
                        editor.delete_shapes(&ids)?;
                    }
                    Ok(EventOutcome::Halt)
                }
                "a" if info.modifiers.accel() => {
                    editor.select_all()?;
                    Ok(EventOutcome::Halt)
                }
                _ => Ok(EventOutcome::Continue),
            },
            _ => Ok(EventOutcome::Continue),
        }
    }
}

/// Pointer pressed on a shape, not yet dragged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointingShape;

impl StateBehavior for PointingShape {
    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match &info.event {
            InputEvent::PointerMove { .. } if info.is_dragging => {
                Ok(EventOutcome::Transition(Target::sibling("translating")))
            }
            InputEvent::PointerUp { .. } => {
                // A click inside a multi-selection narrows it to the clicked shape.
                if let EventTarget::Shape(id) = &info.target {
                    if !info.modifiers.shift && ctx.editor.selected_shape_ids().len() > 1 {
                        ctx.editor.select(std::slice::from_ref(id))?;
                    }
                }
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            InputEvent::Complete | InputEvent::Cancel => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ if is_escape(info) => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}

#[derive(Debug)]
struct Translation {
    mark: MarkId,
    start: Vec<(ShapeId, Point)>,
    completed: bool,
}

/// Dragging the selection.
///
/// Every move is its own transaction; leaving without completing rolls the
/// document back to where the drag began.
#[derive(Debug, Clone, Copy, Default)]
pub struct Translating;

impl Translating {
    fn translate(editor: &mut EditorCore, translation: &Translation, info: &EventInfo) -> Result<()> {
        let Some((_, origin)) = translation.start.first() else {
            return Ok(());
        };
        let mut delta = info.drag_delta();
        if info.modifiers.shift {
            if delta.x.abs() > delta.y.abs() {
                delta.y = 0.0;
            } else {
                delta.x = 0.0;
            }
        }
        if editor.preferences().get().is_snap_mode || info.modifiers.accel() {
            delta = snap_translation(*origin, delta, GRID_SIZE);
        }
        editor.run(TransactionConfig::default(), |tx| {
            for (id, start) in &translation.start {
                tx.update_shape(id, |shape| {
                    shape.x = start.x + delta.x;
                    shape.y = start.y + delta.y;
                })?;
            }
            Ok(())
        })
    }
}

impl StateBehavior for Translating {
    fn on_enter(&self, ctx: &mut StateContext<'_>, info: Option<&EventInfo>) -> Result<()> {
        let mark = ctx.editor.mark_history_stopping_point();
        let selected = ctx.editor.selected_shape_ids();
        let start = ctx.editor.store().read(|view| {
            selected
                .into_iter()
                .filter(|id| !view.is_shape_or_ancestor_locked(id))
                .filter_map(|id| view.shape(&id).map(|s| (id, s.position())))
                .collect::<Vec<_>>()
        });
        let translation = Translation {
            mark,
            start,
            completed: false,
        };
        if let Some(info) = info {
            Self::translate(ctx.editor, &translation, info)?;
        }
        ctx.data.set(translation);
        Ok(())
    }

    fn on_exit(&self, ctx: &mut StateContext<'_>, _info: Option<&EventInfo>) -> Result<()> {
        if let Some(translation) = ctx.data.take::<Translation>() {
            if !translation.completed {
                ctx.editor.bail_to_mark(translation.mark)?;
            }
        }
        Ok(())
    }

    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        let Some(translation) = ctx.data.get_mut::<Translation>() else {
            return Ok(EventOutcome::Transition(Target::sibling("idle")));
        };
        match &info.event {
            InputEvent::PointerMove { .. } => {
                Self::translate(ctx.editor, translation, info)?;
                Ok(EventOutcome::Halt)
            }
            InputEvent::PointerUp { .. } => {
                Self::translate(ctx.editor, translation, info)?;
                translation.completed = true;
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            InputEvent::Complete => {
                translation.completed = true;
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            InputEvent::Cancel => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ if is_escape(info) => Ok(EventOutcome::Transition(Target::sibling("idle"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}

#[derive(Debug, Default)]
struct Brush {
    initial: Vec<ShapeId>,
}

/// Dragging a selection rectangle over the canvas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brushing;

fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

impl Brushing {
    fn update(editor: &mut EditorCore, brush: &Brush, info: &EventInfo) -> Result<()> {
        let rect = Rect::from_points(info.origin_page_point, info.page_point);
        let mut ids = brush.initial.clone();
        for shape in editor.current_page_shapes_sorted().iter() {
            if shape.parent_id.is_some() || ids.contains(&shape.id) {
                continue;
            }
            if editor.shape_page_bounds(&shape.id).is_some_and(|b| overlaps(b, rect)) {
                ids.push(shape.id.clone());
            }
        }
        editor.select(&ids)
    }
}

impl StateBehavior for Brushing {
    fn on_enter(&self, ctx: &mut StateContext<'_>, _info: Option<&EventInfo>) -> Result<()> {
        // Shift-brushing adds to the selection left in place by idle.
        ctx.data.set(Brush {
            initial: ctx.editor.selected_shape_ids(),
        });
        Ok(())
    }

    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        let brush = ctx.data.get_or_default::<Brush>();
        match &info.event {
            InputEvent::PointerMove { .. } => {
                if info.is_dragging {
                    Self::update(ctx.editor, brush, info)?;
                }
                Ok(EventOutcome::Halt)
            }
            InputEvent::PointerUp { .. } | InputEvent::Complete => {
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            InputEvent::Cancel => {
                let initial = brush.initial.clone();
                ctx.editor.select(&initial)?;
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            _ if is_escape(info) => {
                ctx.editor.select_none()?;
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            _ => Ok(EventOutcome::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::input::InputEvent;
    use crate::records::ShapeId;
    use crate::tools::test_support::{add_geo, drag, editor, shift_down};

    #[test]
    fn test_pointer_down_on_shape_selects_it() {
        let mut editor = editor();
        let id = add_geo(&mut editor, "a", 0.0, 0.0);
        editor.dispatch(InputEvent::pointer_down(50.0, 50.0)).unwrap();
        assert!(editor.is_in("root.select.pointing_shape"));
        assert_eq!(editor.selected_shape_ids(), vec![id]);
        editor.dispatch(InputEvent::pointer_up(50.0, 50.0)).unwrap();
        assert!(editor.is_in("root.select.idle"));
    }

    #[test]
    fn test_shift_click_toggles() {
        let mut editor = editor();
        let a = add_geo(&mut editor, "a", 0.0, 0.0);
        let b = add_geo(&mut editor, "b", 200.0, 0.0);
        editor.dispatch(InputEvent::pointer_down(50.0, 50.0)).unwrap();
        editor.dispatch(InputEvent::pointer_up(50.0, 50.0)).unwrap();
        editor.dispatch(shift_down(250.0, 50.0)).unwrap();
        editor.dispatch(InputEvent::pointer_up(250.0, 50.0)).unwrap();
        assert_eq!(editor.selected_shape_ids(), vec![a.clone(), b]);
        editor.dispatch(shift_down(250.0, 50.0)).unwrap();
        editor.dispatch(InputEvent::pointer_up(250.0, 50.0)).unwrap();
        assert_eq!(editor.selected_shape_ids(), vec![a]);
    }

    #[test]
    fn test_drag_translates_as_one_undo_step() {
        let mut editor = editor();
        let id = add_geo(&mut editor, "a", 0.0, 0.0);
        editor.dispatch(InputEvent::pointer_down(50.0, 50.0)).unwrap();
        editor.dispatch(InputEvent::pointer_move(60.0, 50.0)).unwrap();
        assert!(editor.is_in("root.select.translating"));
        editor.dispatch(InputEvent::pointer_move(90.0, 70.0)).unwrap();
        editor.dispatch(InputEvent::pointer_up(90.0, 70.0)).unwrap();
        assert!(editor.is_in("root.select.idle"));
        let shape = editor.shape(&id).unwrap();
        assert_eq!((shape.x, shape.y), (40.0, 20.0));

        editor.undo().unwrap();
        let shape = editor.shape(&id).unwrap();
        assert_eq!((shape.x, shape.y), (0.0, 0.0));
        // Creation is still there.
        editor.undo().unwrap();
        assert!(editor.shape(&id).is_none());
    }

    #[test]
    fn test_cancel_translation_rolls_back() {
        let mut editor = editor();
        let id = add_geo(&mut editor, "a", 0.0, 0.0);
        editor.dispatch(InputEvent::pointer_down(50.0, 50.0)).unwrap();
        editor.dispatch(InputEvent::pointer_move(150.0, 150.0)).unwrap();
        assert_eq!(editor.shape(&id).unwrap().x, 100.0);
        editor.dispatch(InputEvent::Cancel).unwrap();
        assert!(editor.is_in("root.select.idle"));
        assert_eq!(editor.shape(&id).unwrap().x, 0.0);
        assert!(!editor.can_redo());
    }

    #[test]
    fn test_locked_shapes_stay_put() {
        let mut editor = editor();
        let id = add_geo(&mut editor, "a", 0.0, 0.0);
        editor.toggle_lock(std::slice::from_ref(&id)).unwrap();
        drag(&mut editor, (50.0, 50.0), (150.0, 50.0));
        assert_eq!(editor.shape(&id).unwrap().x, 0.0);
    }

    #[test]
    fn test_brush_selects_overlapping_shapes() {
        let mut editor = editor();
        let a = add_geo(&mut editor, "a", 0.0, 0.0);
        let _far = add_geo(&mut editor, "far", 500.0, 400.0);
        let b = add_geo(&mut editor, "b", 150.0, 0.0);
        drag(&mut editor, (-20.0, -20.0), (160.0, 40.0));
        assert!(editor.is_in("root.select.idle"));
        let mut selected = editor.selected_shape_ids();
        selected.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(selected, expected);
    }

    #[test]
    fn test_delete_key_removes_selection() {
        let mut editor = editor();
        let id = add_geo(&mut editor, "a", 0.0, 0.0);
        editor.select(std::slice::from_ref(&id)).unwrap();
        editor.dispatch(InputEvent::key_down("Delete")).unwrap();
        assert!(editor.shape(&id).is_none());
        assert!(editor.selected_shape_ids().is_empty());
        editor.undo().unwrap();
        assert!(editor.shape(&ShapeId::from_key("a")).is_some());
    }
}
