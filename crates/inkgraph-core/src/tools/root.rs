//! Root state: wheel navigation and global shortcuts.

use super::ToolKind;
use crate::editor::EditorCore;
use crate::error::Result;
use crate::input::{EventInfo, InputEvent};
use crate::statechart::{EventOutcome, StateBehavior, StateContext, Target};
use kurbo::Vec2;

/// Handles what every tool shares, before the event reaches the tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootState;

impl StateBehavior for RootState {
    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match &info.event {
            InputEvent::Wheel { delta, .. } => {
                wheel(ctx.editor, info, *delta)?;
                Ok(EventOutcome::Halt)
            }
            InputEvent::KeyDown { key, .. } if !info.is_pointer_down => {
                if info.modifiers.accel() {
                    return match key.as_str() {
                        "z" if info.modifiers.shift => ctx.editor.redo().map(|_| EventOutcome::Halt),
                        "z" => ctx.editor.undo().map(|_| EventOutcome::Halt),
                        "y" => ctx.editor.redo().map(|_| EventOutcome::Halt),
                        _ => Ok(EventOutcome::Continue),
                    };
                }
                match ToolKind::from_shortcut(key) {
                    Some(tool) => {
                        if let Some(kind) = tool.geo_kind() {
                            ctx.editor.set_next_geo(kind);
                        }
                        Ok(EventOutcome::Transition(Target::absolute(tool.path())))
                    }
                    None => Ok(EventOutcome::Continue),
                }
            }
            _ => Ok(EventOutcome::Continue),
        }
    }
}

/// Pan by the wheel delta, or zoom about the pointer when the accelerator
/// is held or wheel zoom is preferred.
fn wheel(editor: &mut EditorCore, info: &EventInfo, delta: Vec2) -> Result<bool> {
    let (pan_speed, zoom_speed) = {
        let options = editor.camera_controller().options();
        (options.pan_speed, options.zoom_speed)
    };
    if info.modifiers.accel() || editor.preferences().get().is_wheel_zoom {
        let factor = (1.0 - delta.y / 100.0 * zoom_speed).max(0.01);
        editor.zoom_by(factor, info.screen_point)
    } else {
        editor.pan_by(-delta * pan_speed)
    }
}

#[cfg(test)]
mod tests {
    use crate::camera::Camera;
    use crate::input::{InputEvent, Modifiers};
    use crate::tools::test_support::{add_geo, drag, editor};
    use kurbo::{Point, Vec2};

    #[test]
    fn test_wheel_pans() {
        let mut editor = editor();
        editor
            .dispatch(InputEvent::Wheel {
                point: Point::new(100.0, 100.0),
                delta: Vec2::new(0.0, 40.0),
                modifiers: Modifiers::NONE,
            })
            .unwrap();
        assert_eq!(editor.camera(), Camera::new(0.0, -40.0, 1.0));
    }

    #[test]
    fn test_ctrl_wheel_zooms_about_pointer() {
        let mut editor = editor();
        let before = editor.screen_to_page(Point::new(200.0, 100.0));
        editor
            .dispatch(InputEvent::Wheel {
                point: Point::new(200.0, 100.0),
                delta: Vec2::new(0.0, -50.0),
                modifiers: Modifiers::ctrl(),
            })
            .unwrap();
        assert_eq!(editor.camera().z, 1.5);
        let after = editor.screen_to_page(Point::new(200.0, 100.0));
        assert!((after - before).hypot() < 1e-9);
    }

    #[test]
    fn test_undo_redo_shortcuts() {
        let mut editor = editor();
        add_geo(&mut editor, "a", 0.0, 0.0);
        drag(&mut editor, (50.0, 50.0), (150.0, 50.0));
        let id = crate::records::ShapeId::from_key("a");
        assert_eq!(editor.shape(&id).unwrap().x, 100.0);

        let ctrl_z = InputEvent::KeyDown {
            key: "z".into(),
            modifiers: Modifiers::ctrl(),
        };
        editor.dispatch(ctrl_z).unwrap();
        assert_eq!(editor.shape(&id).unwrap().x, 0.0);

        editor
            .dispatch(InputEvent::KeyDown {
                key: "y".into(),
                modifiers: Modifiers::ctrl(),
            })
            .unwrap();
        assert_eq!(editor.shape(&id).unwrap().x, 100.0);
    }
}
