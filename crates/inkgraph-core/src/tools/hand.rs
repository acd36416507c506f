//! Hand tool: drag to pan.

use crate::error::Result;
use crate::input::{EventInfo, InputEvent};
use crate::statechart::{EventOutcome, StateBehavior, StateContext, Target};

#[derive(Debug, Clone, Copy, Default)]
pub struct HandIdle;

impl StateBehavior for HandIdle {
    fn on_event(&self, _ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match info.event {
            InputEvent::PointerDown { .. } => Ok(EventOutcome::Transition(Target::sibling("dragging"))),
            _ => Ok(EventOutcome::Continue),
        }
    }
}

/// Pans the camera by every pointer move.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandDragging;

impl StateBehavior for HandDragging {
    fn on_event(&self, ctx: &mut StateContext<'_>, info: &EventInfo) -> Result<EventOutcome> {
        match info.event {
            InputEvent::PointerMove { .. } => {
                ctx.editor.pan_by(info.screen_delta)?;
                Ok(EventOutcome::Halt)
            }
            InputEvent::PointerUp { .. } | InputEvent::Complete | InputEvent::Cancel => {
                Ok(EventOutcome::Transition(Target::sibling("idle")))
            }
            _ => Ok(EventOutcome::Continue),
        }
    }
}
