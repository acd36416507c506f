//! Camera module for pan/zoom transforms.
//!
//! The camera of a page is stored as a session record `{x, y, z}`: `x`/`y`
//! are the page-space offset and `z` the zoom. A page point `p` is drawn at
//! `viewport.origin + (p + (x, y)) * z` on screen.
//!
//! [`CameraController`] holds the per-editor camera settings and the
//! viewport, and computes constrained cameras. It never touches the store;
//! the editor reads and writes camera records around it.

use crate::input::Instant;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Camera transform: page offset and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

impl Camera {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Page to screen transform for a viewport whose top-left corner is at
    /// `origin` on screen.
    pub fn transform(&self, origin: Point) -> Affine {
        Affine::translate(origin.to_vec2())
            * Affine::scale(self.z)
            * Affine::translate(Vec2::new(self.x, self.y))
    }

    /// Screen to page transform.
    pub fn inverse_transform(&self, origin: Point) -> Affine {
        self.transform(origin).inverse()
    }

    fn approx_eq(&self, other: &Camera) -> bool {
        (self.x - other.x).abs() < 1e-9 && (self.y - other.y).abs() < 1e-9 && (self.z - other.z).abs() < 1e-9
    }
}

/// How the constraint bounds relate to the viewport on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBehavior {
    /// No positional constraint.
    #[default]
    Free,
    /// Above the fit zoom the bounds cover the viewport; below it the
    /// bounds stay entirely in view.
    Inside,
    /// The bounds may never leave the viewport.
    Outside,
    /// The bounds are pinned at `origin`.
    Fixed,
    /// Like `inside` above the fit zoom; below it the bounds are pinned at
    /// `origin`.
    Contain,
}

/// Per-axis behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisBehavior {
    pub x: CameraBehavior,
    pub y: CameraBehavior,
}

impl From<CameraBehavior> for AxisBehavior {
    fn from(behavior: CameraBehavior) -> Self {
        Self {
            x: behavior,
            y: behavior,
        }
    }
}

/// How a zoom scalar is derived from the bounds and the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZoomFit {
    /// Always 1.
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "fit-min")]
    FitMin,
    #[serde(rename = "fit-max")]
    FitMax,
    #[serde(rename = "fit-x")]
    FitX,
    #[serde(rename = "fit-y")]
    FitY,
    #[serde(rename = "fit-min-100")]
    FitMin100,
    #[serde(rename = "fit-max-100")]
    FitMax100,
    #[serde(rename = "fit-x-100")]
    FitX100,
    #[serde(rename = "fit-y-100")]
    FitY100,
}

impl ZoomFit {
    /// Resolve against the zooms that fit the bounds horizontally (`zx`)
    /// and vertically (`zy`).
    pub fn resolve(self, zx: f64, zy: f64) -> f64 {
        match self {
            ZoomFit::Default => 1.0,
            ZoomFit::FitMin => zx.min(zy),
            ZoomFit::FitMax => zx.max(zy),
            ZoomFit::FitX => zx,
            ZoomFit::FitY => zy,
            ZoomFit::FitMin100 => zx.min(zy).min(1.0),
            ZoomFit::FitMax100 => zx.max(zy).min(1.0),
            ZoomFit::FitX100 => zx.min(1.0),
            ZoomFit::FitY100 => zy.min(1.0),
        }
    }
}

/// Positional and zoom constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConstraints {
    /// Page-space area the camera is constrained to.
    pub bounds: Rect,
    /// Screen-space padding around the bounds.
    pub padding: Vec2,
    /// Where the bounds sit in the free viewport space, from (0, 0) top-left
    /// to (1, 1) bottom-right.
    pub origin: Point,
    pub behavior: AxisBehavior,
    pub initial_zoom: ZoomFit,
    pub base_zoom: ZoomFit,
}

impl CameraConstraints {
    pub fn new(bounds: Rect, behavior: impl Into<AxisBehavior>) -> Self {
        Self {
            bounds,
            padding: Vec2::ZERO,
            origin: Point::new(0.5, 0.5),
            behavior: behavior.into(),
            initial_zoom: ZoomFit::Default,
            base_zoom: ZoomFit::Default,
        }
    }
}

/// Camera settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraOptions {
    /// When set, every camera-setting operation is a no-op.
    pub is_locked: bool,
    /// Multiplier for wheel panning.
    pub pan_speed: f64,
    /// Multiplier for wheel zooming.
    pub zoom_speed: f64,
    /// Zoom ladder, ascending. The first and last steps bound the zoom.
    pub zoom_steps: Vec<f64>,
    pub constraints: Option<CameraConstraints>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            is_locked: false,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            zoom_steps: vec![0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0],
            constraints: None,
        }
    }
}

/// Whether the camera is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Moving { last_change: Instant },
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Computes camera positions for one editor's viewport.
#[derive(Debug, Clone)]
pub struct CameraController {
    options: CameraOptions,
    viewport: Rect,
    state: CameraState,
    settle_after: Duration,
}

impl CameraController {
    pub fn new(options: CameraOptions, viewport: Rect, settle_after: Duration) -> Self {
        Self {
            options,
            viewport,
            state: CameraState::Idle,
            settle_after,
        }
    }

    pub fn options(&self) -> &CameraOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: CameraOptions) {
        self.options = options;
    }

    pub fn is_locked(&self) -> bool {
        self.options.is_locked
    }

    /// Viewport bounds in screen space.
    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Record that the camera changed at `now`.
    pub fn mark_moving(&mut self, now: Instant) {
        if self.state == CameraState::Idle {
            log::trace!("camera moving");
        }
        self.state = CameraState::Moving { last_change: now };
    }

    /// Settle back to idle once the camera has been still long enough.
    pub fn tick(&mut self, now: Instant) {
        if let CameraState::Moving { last_change } = self.state {
            if now.saturating_duration_since(last_change) >= self.settle_after {
                log::trace!("camera idle");
                self.state = CameraState::Idle;
            }
        }
    }

    pub fn screen_to_page(&self, camera: &Camera, point: Point) -> Point {
        camera.inverse_transform(self.viewport.origin()) * point
    }

    pub fn page_to_screen(&self, camera: &Camera, point: Point) -> Point {
        camera.transform(self.viewport.origin()) * point
    }

    /// The part of the page visible through the viewport.
    pub fn viewport_page_bounds(&self, camera: &Camera) -> Rect {
        let size = self.viewport.size();
        Rect::from_origin_size(
            Point::new(-camera.x, -camera.y),
            Size::new(size.width / camera.z, size.height / camera.z),
        )
    }

    fn min_max_zoom(&self) -> (f64, f64) {
        let steps = &self.options.zoom_steps;
        let min = steps.first().copied().unwrap_or(0.1);
        let max = steps.last().copied().unwrap_or(8.0);
        (min, max)
    }

    /// Effective padding and the zooms that fit the bounds on each axis.
    fn fit(&self, constraints: &CameraConstraints) -> (f64, f64, f64, f64) {
        let (vw, vh) = (self.viewport.width(), self.viewport.height());
        let px = constraints.padding.x.min(vw / 2.0);
        let py = constraints.padding.y.min(vh / 2.0);
        let bounds = constraints.bounds;
        let zx = (vw - px * 2.0) / bounds.width().max(f64::EPSILON);
        let zy = (vh - py * 2.0) / bounds.height().max(f64::EPSILON);
        (px, py, zx, zy)
    }

    /// The scalar applied to the zoom ladder.
    pub fn base_zoom(&self) -> f64 {
        match &self.options.constraints {
            Some(constraints) => {
                let (_, _, zx, zy) = self.fit(constraints);
                constraints.base_zoom.resolve(zx, zy)
            }
            None => 1.0,
        }
    }

    /// The zoom used when the camera is reset.
    pub fn initial_zoom(&self) -> f64 {
        match &self.options.constraints {
            Some(constraints) => {
                let (_, _, zx, zy) = self.fit(constraints);
                constraints.initial_zoom.resolve(zx, zy)
            }
            None => 1.0,
        }
    }

    /// Clamp `target` to the zoom range and constraints. With `reset`, the
    /// zoom becomes the initial zoom and the position the constraint origin.
    pub fn constrain(&self, current: &Camera, target: Camera, reset: bool) -> Camera {
        let Camera { mut x, mut y, mut z } = target;
        let (vw, vh) = (self.viewport.width(), self.viewport.height());
        let (min_step, max_step) = self.min_max_zoom();

        let Some(constraints) = &self.options.constraints else {
            if reset {
                z = 1.0;
            }
            if z < min_step || z > max_step {
                z = clamp(z, min_step, max_step);
                x = current.x + (vw / z / 2.0) - (vw / current.z / 2.0);
                y = current.y + (vh / z / 2.0) - (vh / current.z / 2.0);
            }
            return Camera::new(x, y, z);
        };

        let (px, py, zx, zy) = self.fit(constraints);
        let bounds = constraints.bounds;
        let base = constraints.base_zoom.resolve(zx, zy);
        let (min_z, max_z) = (min_step * base, max_step * base);

        if reset {
            z = constraints.initial_zoom.resolve(zx, zy);
        }
        if z < min_z || z > max_z {
            // Keep the current center while clamping the zoom.
            z = clamp(z, min_z, max_z);
            x = current.x + (vw / z / 2.0) - (vw / current.z / 2.0);
            y = current.y + (vh / z / 2.0) - (vh / current.z / 2.0);
        }

        let min_x = px / z - bounds.x0;
        let min_y = py / z - bounds.y0;
        let free_w = (vw - px * 2.0) / z - bounds.width();
        let free_h = (vh - py * 2.0) / z - bounds.height();
        let origin_x = min_x + free_w * constraints.origin.x;
        let origin_y = min_y + free_h * constraints.origin.y;

        if reset {
            return Camera::new(origin_x, origin_y, z);
        }

        x = constrain_axis(
            AxisSpan {
                value: x,
                behavior: constraints.behavior.x,
                min: min_x,
                free: free_w,
                origin: origin_x,
                fit: zx,
                padding: px,
                viewport: vw,
                start: bounds.x0,
                size: bounds.width(),
            },
            z,
        );
        y = constrain_axis(
            AxisSpan {
                value: y,
                behavior: constraints.behavior.y,
                min: min_y,
                free: free_h,
                origin: origin_y,
                fit: zy,
                padding: py,
                viewport: vh,
                start: bounds.y0,
                size: bounds.height(),
            },
            z,
        );
        Camera::new(x, y, z)
    }

    /// Camera after zooming to the next step up, keeping `point` (screen,
    /// relative to the viewport) fixed. `None` if locked or there is no
    /// ladder.
    pub fn zoom_in(&self, current: &Camera, point: Point) -> Option<Camera> {
        let steps = &self.options.zoom_steps;
        if self.is_locked() || steps.len() < 2 {
            return None;
        }
        let base = self.base_zoom();
        let mut zoom = steps[steps.len() - 1] * base;
        for pair in steps.windows(2) {
            let (z1, z2) = (pair[0] * base, pair[1] * base);
            if z2 - current.z <= (z2 - z1) / 2.0 {
                continue;
            }
            zoom = z2;
            break;
        }
        Some(zoom_about(current, point, zoom))
    }

    /// Camera after zooming to the next step down.
    pub fn zoom_out(&self, current: &Camera, point: Point) -> Option<Camera> {
        let steps = &self.options.zoom_steps;
        if self.is_locked() || steps.len() < 2 {
            return None;
        }
        let base = self.base_zoom();
        let mut zoom = steps[0] * base;
        for pair in steps.windows(2).rev() {
            let (z1, z2) = (pair[0] * base, pair[1] * base);
            if z2 - current.z >= (z2 - z1) / 2.0 {
                continue;
            }
            zoom = z1;
            break;
        }
        Some(zoom_about(current, point, zoom))
    }

    /// Camera that fits `bounds` (page space) in the viewport with `padding`
    /// screen pixels around it.
    pub fn zoom_to_bounds(&self, bounds: Rect, padding: f64) -> Camera {
        let (vw, vh) = (self.viewport.width(), self.viewport.height());
        let (min_step, max_step) = self.min_max_zoom();
        let base = self.base_zoom();
        let inner_w = (vw - padding * 2.0).max(1.0);
        let inner_h = (vh - padding * 2.0).max(1.0);
        let z = if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            1.0
        } else {
            (inner_w / bounds.width()).min(inner_h / bounds.height())
        };
        let z = clamp(z, min_step * base, max_step * base);
        let center = bounds.center();
        Camera::new(vw / z / 2.0 - center.x, vh / z / 2.0 - center.y, z)
    }

    /// Whether `next` differs from `current` enough to be written.
    pub fn changed(current: &Camera, next: &Camera) -> bool {
        !current.approx_eq(next)
    }
}

/// Constraint inputs along one axis.
struct AxisSpan {
    value: f64,
    behavior: CameraBehavior,
    /// Offset that puts the bounds' start at the padding edge.
    min: f64,
    /// Viewport space left over once the bounds are placed, in page units.
    free: f64,
    origin: f64,
    /// Zoom at which the bounds exactly fill the padded viewport.
    fit: f64,
    padding: f64,
    viewport: f64,
    start: f64,
    size: f64,
}

fn constrain_axis(axis: AxisSpan, z: f64) -> f64 {
    match axis.behavior {
        CameraBehavior::Free => axis.value,
        CameraBehavior::Fixed => axis.origin,
        CameraBehavior::Contain if z < axis.fit => axis.origin,
        CameraBehavior::Inside if z < axis.fit => clamp(
            axis.value,
            axis.min,
            (axis.viewport - axis.padding) / z - axis.size - axis.start,
        ),
        CameraBehavior::Contain | CameraBehavior::Inside => {
            clamp(axis.value, axis.min + axis.free, axis.min)
        }
        CameraBehavior::Outside => clamp(
            axis.value,
            axis.padding / z - axis.size - axis.start,
            (axis.viewport - axis.padding) / z - axis.start,
        ),
    }
}

/// Camera with zoom `zoom` keeping the viewport-relative screen point fixed.
pub fn zoom_about(current: &Camera, point: Point, zoom: f64) -> Camera {
    Camera::new(
        current.x + (point.x / zoom - point.x) - (point.x / current.z - point.x),
        current.y + (point.y / zoom - point.y) - (point.y / current.z - point.y),
        zoom,
    )
}
