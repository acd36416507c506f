//! Input state management for pointer/wheel/keyboard events.

use crate::records::ShapeId;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

// Use web_time for WASM compatibility
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    /// The platform accelerator: ctrl or meta.
    pub fn accel(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Raw input, as delivered by the host. Points are in screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    PointerDown {
        point: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    PointerMove {
        point: Point,
        modifiers: Modifiers,
    },
    PointerUp {
        point: Point,
        button: MouseButton,
        modifiers: Modifiers,
    },
    Wheel {
        point: Point,
        delta: Vec2,
        modifiers: Modifiers,
    },
    KeyDown {
        key: String,
        modifiers: Modifiers,
    },
    KeyUp {
        key: String,
        modifiers: Modifiers,
    },
    /// Abort the current gesture.
    Cancel,
    /// Finish the current gesture.
    Complete,
    /// Periodic clock tick.
    Tick,
}

impl InputEvent {
    pub fn pointer_down(x: f64, y: f64) -> Self {
        InputEvent::PointerDown {
            point: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        InputEvent::PointerMove {
            point: Point::new(x, y),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn pointer_up(x: f64, y: f64) -> Self {
        InputEvent::PointerUp {
            point: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn key_down(key: impl Into<String>) -> Self {
        InputEvent::KeyDown {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }

    /// The screen point carried by pointer and wheel events.
    pub fn point(&self) -> Option<Point> {
        match self {
            InputEvent::PointerDown { point, .. }
            | InputEvent::PointerMove { point, .. }
            | InputEvent::PointerUp { point, .. }
            | InputEvent::Wheel { point, .. } => Some(*point),
            _ => None,
        }
    }

    /// Modifiers carried by the event, if any.
    pub fn modifiers(&self) -> Option<Modifiers> {
        match self {
            InputEvent::PointerDown { modifiers, .. }
            | InputEvent::PointerMove { modifiers, .. }
            | InputEvent::PointerUp { modifiers, .. }
            | InputEvent::Wheel { modifiers, .. }
            | InputEvent::KeyDown { modifiers, .. }
            | InputEvent::KeyUp { modifiers, .. } => Some(*modifiers),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            InputEvent::PointerDown { .. } | InputEvent::PointerMove { .. } | InputEvent::PointerUp { .. }
        )
    }
}

/// What lies under the pointer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventTarget {
    #[default]
    Canvas,
    Shape(ShapeId),
}

/// An input event enriched with editor context, as seen by the state chart.
#[derive(Debug, Clone)]
pub struct EventInfo {
    pub event: InputEvent,
    /// Current pointer position.
    pub screen_point: Point,
    pub page_point: Point,
    /// Where the current pointer gesture started.
    pub origin_screen_point: Point,
    pub origin_page_point: Point,
    /// Pointer movement since the previous pointer event, in screen space.
    pub screen_delta: Vec2,
    pub is_pointer_down: bool,
    /// The current gesture moved past the drag distance.
    pub is_dragging: bool,
    /// Modifiers, with releases delayed by the decay window.
    pub modifiers: Modifiers,
    pub target: EventTarget,
    pub now: Instant,
}

impl EventInfo {
    /// Page-space offset of the pointer from the gesture origin.
    pub fn drag_delta(&self) -> Vec2 {
        self.page_point - self.origin_page_point
    }

    pub fn key(&self) -> Option<&str> {
        match &self.event {
            InputEvent::KeyDown { key, .. } | InputEvent::KeyUp { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }
}

/// Tracks the current input state across events.
#[derive(Debug, Clone)]
pub struct InputState {
    pointer: Point,
    previous_pointer: Point,
    origin: Point,
    origin_page: Point,
    pointer_down: bool,
    dragging: bool,
    pressed_keys: HashSet<String>,
    modifiers: Modifiers,
    /// When each of shift, ctrl, alt, meta was last released.
    released_at: [Option<Instant>; 4],
    drag_distance: f64,
    modifier_decay: Duration,
}

impl InputState {
    pub fn new(drag_distance: f64, modifier_decay: Duration) -> Self {
        Self {
            pointer: Point::ZERO,
            previous_pointer: Point::ZERO,
            origin: Point::ZERO,
            origin_page: Point::ZERO,
            pointer_down: false,
            dragging: false,
            pressed_keys: HashSet::new(),
            modifiers: Modifiers::NONE,
            released_at: [None; 4],
            drag_distance,
            modifier_decay,
        }
    }

    /// Fold `event` into the state. `page_point` is the event's point in page
    /// space, used to remember where a gesture started.
    pub fn update(&mut self, event: &InputEvent, page_point: Point, now: Instant) {
        if let Some(modifiers) = event.modifiers() {
            self.set_modifiers(modifiers, now);
        }
        if let Some(point) = event.point() {
            self.previous_pointer = self.pointer;
            self.pointer = point;
        }
        match event {
            InputEvent::PointerDown { point, .. } => {
                self.pointer_down = true;
                self.dragging = false;
                self.origin = *point;
                self.origin_page = page_point;
            }
            InputEvent::PointerMove { point, .. } => {
                if self.pointer_down && !self.dragging && (*point - self.origin).hypot() > self.drag_distance {
                    self.dragging = true;
                }
            }
            InputEvent::PointerUp { .. } => {
                self.pointer_down = false;
            }
            InputEvent::KeyDown { key, .. } => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp { key, .. } => {
                self.pressed_keys.remove(key);
            }
            InputEvent::Cancel => {
                self.pointer_down = false;
                self.dragging = false;
            }
            InputEvent::Wheel { .. } | InputEvent::Complete | InputEvent::Tick => {}
        }
    }

    fn set_modifiers(&mut self, next: Modifiers, now: Instant) {
        let before = [self.modifiers.shift, self.modifiers.ctrl, self.modifiers.alt, self.modifiers.meta];
        let after = [next.shift, next.ctrl, next.alt, next.meta];
        for i in 0..4 {
            if after[i] {
                self.released_at[i] = None;
            } else if before[i] {
                self.released_at[i] = Some(now);
            }
        }
        self.modifiers = next;
    }

    /// Modifiers as reported to tools: a released key still counts as held
    /// for the decay window.
    pub fn modifiers_at(&self, now: Instant) -> Modifiers {
        let held = |i: usize, down: bool| {
            down || self.released_at[i]
                .is_some_and(|at| now.saturating_duration_since(at) < self.modifier_decay)
        };
        Modifiers {
            shift: held(0, self.modifiers.shift),
            ctrl: held(1, self.modifiers.ctrl),
            alt: held(2, self.modifiers.alt),
            meta: held(3, self.modifiers.meta),
        }
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn origin_page(&self) -> Point {
        self.origin_page
    }

    /// Pointer movement since the previous pointer event.
    pub fn delta(&self) -> Vec2 {
        self.pointer - self.previous_pointer
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer_down
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_key_down(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }
}
