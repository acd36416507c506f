//! Tool system: the default state chart and its behaviors.
//!
//! ```text
//! root
//! ├── select: idle, pointing_shape, translating, brushing
//! ├── hand:   idle, dragging
//! └── geo:    idle, pointing, drawing
//! ```

mod geo;
mod hand;
mod root;
mod select;

pub use geo::{GeoDrawing, GeoIdle, GeoPointing};
pub use hand::{HandDragging, HandIdle};
pub use root::RootState;
pub use select::{Brushing, PointingShape, SelectIdle, Translating};

use crate::error::Result;
use crate::shapes::GeoKind;
use crate::statechart::{Passthrough, StateChart, StateDef};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    Rectangle,
    Ellipse,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [ToolKind::Select, ToolKind::Pan, ToolKind::Rectangle, ToolKind::Ellipse];

    /// State chart path of the tool.
    pub fn path(self) -> &'static str {
        match self {
            ToolKind::Select => "root.select",
            ToolKind::Pan => "root.hand",
            ToolKind::Rectangle | ToolKind::Ellipse => "root.geo",
        }
    }

    /// The geo kind drawn, for drawing tools.
    pub fn geo_kind(self) -> Option<GeoKind> {
        match self {
            ToolKind::Rectangle => Some(GeoKind::Rectangle),
            ToolKind::Ellipse => Some(GeoKind::Ellipse),
            ToolKind::Select | ToolKind::Pan => None,
        }
    }

    /// Keyboard shortcut.
    pub fn from_shortcut(key: &str) -> Option<Self> {
        match key {
            "v" => Some(ToolKind::Select),
            "h" => Some(ToolKind::Pan),
            "r" => Some(ToolKind::Rectangle),
            "o" => Some(ToolKind::Ellipse),
            _ => None,
        }
    }
}

/// Shape of the default chart, without behaviors.
pub fn default_chart_def() -> StateDef {
    StateDef::branch(
        "root",
        "root",
        "select",
        vec![
            StateDef::branch(
                "select",
                "select",
                "idle",
                vec![
                    StateDef::leaf("idle", "select.idle"),
                    StateDef::leaf("pointing_shape", "select.pointing_shape"),
                    StateDef::leaf("translating", "select.translating"),
                    StateDef::leaf("brushing", "select.brushing"),
                ],
            ),
            StateDef::branch(
                "hand",
                "hand",
                "idle",
                vec![
                    StateDef::leaf("idle", "hand.idle"),
                    StateDef::leaf("dragging", "hand.dragging"),
                ],
            ),
            StateDef::branch(
                "geo",
                "geo",
                "idle",
                vec![
                    StateDef::leaf("idle", "geo.idle"),
                    StateDef::leaf("pointing", "geo.pointing"),
                    StateDef::leaf("drawing", "geo.drawing"),
                ],
            ),
        ],
    )
}

/// The default chart with every behavior attached.
pub fn default_chart() -> Result<StateChart> {
    Ok(StateChart::new(default_chart_def())?
        .with_behavior("root", RootState)
        .with_behavior("select", Passthrough)
        .with_behavior("select.idle", SelectIdle)
        .with_behavior("select.pointing_shape", PointingShape)
        .with_behavior("select.translating", Translating)
        .with_behavior("select.brushing", Brushing)
        .with_behavior("hand", Passthrough)
        .with_behavior("hand.idle", HandIdle)
        .with_behavior("hand.dragging", HandDragging)
        .with_behavior("geo", Passthrough)
        .with_behavior("geo.idle", GeoIdle)
        .with_behavior("geo.pointing", GeoPointing)
        .with_behavior("geo.drawing", GeoDrawing))
}


#[cfg(test)]
mod tests {
    use super::test_support::editor;
    use super::*;
    use crate::input::InputEvent;

    #[test]
    fn test_tool_selection() {
        let mut editor = editor();
        assert_eq!(editor.current_tool(), Some(ToolKind::Select));

        editor.set_tool(ToolKind::Rectangle).unwrap();
        assert_eq!(editor.current_tool(), Some(ToolKind::Rectangle));
        assert!(editor.is_in("root.geo.idle"));

        editor.set_tool(ToolKind::Ellipse).unwrap();
        assert_eq!(editor.current_tool(), Some(ToolKind::Ellipse));
    }

    #[test]
    fn test_shortcuts() {
        let mut editor = editor();
        editor.dispatch(InputEvent::key_down("h")).unwrap();
        assert!(editor.is_in("root.hand.idle"));
        editor.dispatch(InputEvent::key_down("r")).unwrap();
        assert_eq!(editor.current_tool(), Some(ToolKind::Rectangle));
        editor.dispatch(InputEvent::key_down("v")).unwrap();
        assert!(editor.is_in("root.select.idle"));
    }

    #[test]
    fn test_every_kind_has_a_behavior() {
        assert!(default_chart().is_ok());
        assert_eq!(ToolKind::from_shortcut("x"), None);
    }
}
