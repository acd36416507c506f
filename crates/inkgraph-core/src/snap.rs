//! Snap functionality for aligning moved shapes to the grid.

use kurbo::{Point, Vec2};

/// Grid size for snapping.
pub const GRID_SIZE: f64 = 20.0;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid_size: f64) -> SnapResult {
    if grid_size <= 0.0 {
        return SnapResult::none(point);
    }
    let x = (point.x / grid_size).round() * grid_size;
    let y = (point.y / grid_size).round() * grid_size;
    SnapResult {
        point: Point::new(x, y),
        snapped_x: (x - point.x).abs() > f64::EPSILON,
        snapped_y: (y - point.y).abs() > f64::EPSILON,
    }
}

/// Adjust a translation so that `origin + delta` lands on the grid.
pub fn snap_translation(origin: Point, delta: Vec2, grid_size: f64) -> Vec2 {
    snap_to_grid(origin + delta, grid_size).point - origin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_grid() {
        let result = snap_to_grid(Point::new(23.0, 47.0), 20.0);
        assert_eq!(result.point, Point::new(20.0, 40.0));
        assert!(result.snapped_x);
        assert!(result.snapped_y);
    }

    #[test]
    fn test_snap_to_grid_exact() {
        let result = snap_to_grid(Point::new(40.0, 60.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
        assert!(!result.is_snapped());
    }

    #[test]
    fn test_snap_to_grid_round_up() {
        let result = snap_to_grid(Point::new(31.0, 51.0), 20.0);
        assert_eq!(result.point, Point::new(40.0, 60.0));
    }

    #[test]
    fn test_snap_translation() {
        let delta = snap_translation(Point::new(5.0, 5.0), Vec2::new(28.0, 2.0), GRID_SIZE);
        assert_eq!(delta, Vec2::new(35.0, -5.0));
    }

    #[test]
    fn test_zero_grid_does_not_snap() {
        let result = snap_to_grid(Point::new(3.0, 4.0), 0.0);
        assert_eq!(result, SnapResult::none(Point::new(3.0, 4.0)));
    }
}
