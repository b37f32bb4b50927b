//! Screen geometry in accessibility coordinates.
//!
//! The origin is the top-left corner of the main display and `y` grows
//! downwards, which is the space the automation API reads and writes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Point { Point { x, y } }

    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Size { Size { width, height } }
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            origin: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn min_x(&self) -> f64 { self.origin.x }

    pub fn min_y(&self) -> f64 { self.origin.y }

    pub fn max_x(&self) -> f64 { self.origin.x + self.size.width }

    pub fn max_y(&self) -> f64 { self.origin.y + self.size.height }

    pub fn mid(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn area(&self) -> f64 { self.size.width.max(0.0) * self.size.height.max(0.0) }

    pub fn is_empty(&self) -> bool { self.size.width <= 0.0 || self.size.height <= 0.0 }

    /// Half-open containment: the max edges belong to the neighbouring rect.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Containment with `slop` extra pixels allowed on every side.
    pub fn contains_with_slop(&self, point: Point, slop: f64) -> bool {
        point.x >= self.min_x() - slop
            && point.x <= self.max_x() + slop
            && point.y >= self.min_y() - slop
            && point.y <= self.max_y() + slop
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let x = self.min_x().max(other.min_x());
        let y = self.min_y().max(other.min_y());
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        Rect::new(x, y, (max_x - x).max(0.0), (max_y - y).max(0.0))
    }

    pub fn intersects(&self, other: &Rect) -> bool { !self.intersection(other).is_empty() }

    /// Shrinks the rect by `margin` on every side. Sizes never go negative;
    /// a rect too small to inset collapses onto its centre.
    pub fn inset(&self, margin: f64) -> Rect {
        let width = (self.size.width - 2.0 * margin).max(0.0);
        let height = (self.size.height - 2.0 * margin).max(0.0);
        let x = if width > 0.0 { self.origin.x + margin } else { self.mid().x };
        let y = if height > 0.0 { self.origin.y + margin } else { self.mid().y };
        Rect::new(x, y, width, height)
    }

    pub fn center_distance(&self, other: &Rect) -> f64 { self.mid().distance_to(other.mid()) }

    /// Distance from `point` to the closest point of the rect; zero inside.
    pub fn clamped_distance(&self, point: Point) -> f64 {
        let cx = point.x.clamp(self.min_x(), self.max_x().max(self.min_x()));
        let cy = point.y.clamp(self.min_y(), self.max_y().max(self.min_y()));
        point.distance_to(Point::new(cx, cy))
    }
}

/// Approximate equality, used to tell no-op geometry writes apart from real
/// ones.
pub trait SameAs {
    fn same_as(&self, other: &Self, tolerance: f64) -> bool;
}

impl SameAs for Point {
    fn same_as(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl SameAs for Size {
    fn same_as(&self, other: &Size, tolerance: f64) -> bool {
        (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

impl SameAs for Rect {
    fn same_as(&self, other: &Rect, tolerance: f64) -> bool {
        self.origin.same_as(&other.origin, tolerance) && self.size.same_as(&other.size, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn inset_shrinks_every_side() {
        let r = Rect::new(0.0, 0.0, 600.0, 800.0).inset(8.0);
        assert_eq!(r, Rect::new(8.0, 8.0, 584.0, 784.0));
    }

    #[test]
    fn inset_never_goes_negative() {
        let r = Rect::new(10.0, 10.0, 6.0, 100.0).inset(8.0);
        assert_eq!(r.size.width, 0.0);
        assert_eq!(r.origin.x, 13.0);
        assert_eq!(r.size.height, 84.0);
    }

    #[test]
    fn containment_is_half_open() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(!r.contains(Point::new(100.0, 50.0)));
        assert!(r.contains_with_slop(Point::new(103.0, 50.0), 4.0));
    }

    #[test]
    fn clamped_distance_is_zero_inside() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(r.clamped_distance(Point::new(50.0, 50.0)), 0.0);
        assert_eq!(r.clamped_distance(Point::new(103.0, 50.0)), 3.0);
        assert_eq!(r.clamped_distance(Point::new(103.0, 104.0)), 5.0);
    }

    #[test]
    fn same_as_respects_tolerance() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(1.5, -1.0, 101.0, 99.0);
        assert!(a.same_as(&b, 2.0));
        assert!(!a.same_as(&b, 1.0));
    }

    #[test]
    fn round_keeps_edges_aligned() {
        let r = Rect::new(0.4, 0.6, 99.4, 99.8).round();
        assert_eq!(r, Rect::new(0.0, 1.0, 100.0, 99.0));
    }
}
