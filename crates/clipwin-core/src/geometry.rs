#![forbid(unsafe_code)]

//! Geometric primitives.

/// A point in device (screen) or widget-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle used for extents, clip rectangles, and hit testing.
///
/// Corners are `(x1, y1)` inclusive and `(x2, y2)` exclusive. A rectangle with
/// `x1 == x2` or `y1 == y2` is empty. Constructors keep `x1 <= x2` and
/// `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge (inclusive).
    pub x1: i32,
    /// Top edge (inclusive).
    pub y1: i32,
    /// Right edge (exclusive).
    pub x2: i32,
    /// Bottom edge (exclusive).
    pub y2: i32,
}

impl Rect {
    /// Create a rectangle from two corners, swapping coordinates as needed so
    /// that the result is well formed.
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (y1, y2) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self { x1, y1, x2, y2 }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Create a rectangle anchored at `(0, 0)`.
    #[inline]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::from_origin_size(0, 0, width, height)
    }

    /// Whether the corners are ordered. Rectangles built field by field may
    /// violate this; every constructor upholds it.
    #[inline]
    pub const fn is_well_formed(&self) -> bool {
        self.x1 <= self.x2 && self.y1 <= self.y2
    }

    #[inline]
    pub const fn width(&self) -> i32 {
        self.x2.saturating_sub(self.x1)
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.y2.saturating_sub(self.y1)
    }

    /// Top-left corner.
    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// Area in pixels (zero for empty or malformed rectangles).
    #[inline]
    pub const fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            (self.x2 as i64 - self.x1 as i64) * (self.y2 as i64 - self.y1 as i64)
        }
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.x1 >= self.x2 || self.y1 >= self.y2
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }

    /// Check if `other` lies entirely inside this rectangle.
    ///
    /// An empty `other` is contained by anything.
    #[inline]
    pub const fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.x1 >= self.x1
                && other.y1 >= self.y1
                && other.x2 <= self.x2
                && other.y2 <= self.y2)
    }

    /// Whether the two rectangles share at least one pixel.
    #[inline]
    pub const fn intersects(&self, other: &Rect) -> bool {
        self.x1 < other.x2 && other.x1 < self.x2 && self.y1 < other.y2 && other.y1 < self.y2
    }

    /// Compute the intersection with another rectangle, returning `None` if no overlap.
    #[inline]
    pub fn intersection_opt(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x1 < x2 && y1 < y2 {
            Some(Rect { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Compute the intersection with another rectangle.
    ///
    /// Returns an empty rectangle if the rectangles don't overlap.
    #[inline]
    pub fn intersection(&self, other: &Rect) -> Rect {
        self.intersection_opt(other).unwrap_or_default()
    }

    /// Smallest rectangle containing both. Empty inputs are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Shift by `(dx, dy)`, saturating at the coordinate limits.
    #[inline]
    pub const fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect {
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
            x2: self.x2.saturating_add(dx),
            y2: self.y2.saturating_add(dy),
        }
    }

    /// Same size, new top-left corner. The far edges saturate, so the result
    /// may shrink near `i32::MAX`.
    #[inline]
    pub const fn move_to(&self, x: i32, y: i32) -> Rect {
        Rect {
            x1: x,
            y1: y,
            x2: x.saturating_add(self.width()),
            y2: y.saturating_add(self.height()),
        }
    }

    /// Same size, new top-left corner, or `None` if the far edges would
    /// overflow.
    #[inline]
    pub const fn checked_move_to(&self, x: i32, y: i32) -> Option<Rect> {
        match (x.checked_add(self.width()), y.checked_add(self.height())) {
            (Some(x2), Some(y2)) => Some(Rect { x1: x, y1: y, x2, y2 }),
            _ => None,
        }
    }

    /// Same size, anchored at `(0, 0)`.
    #[inline]
    pub const fn to_local(&self) -> Rect {
        self.move_to(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Rect};

    #[test]
    fn new_normalizes_corners() {
        let r = Rect::new(10, 20, 0, 5);
        assert_eq!(r, Rect::new(0, 5, 10, 20));
        assert!(r.is_well_formed());
    }

    #[test]
    fn contains_is_half_open() {
        let rect = Rect::new(2, 3, 6, 8);
        assert!(rect.contains(2, 3));
        assert!(rect.contains(5, 7));
        assert!(!rect.contains(6, 3));
        assert!(!rect.contains(2, 8));
    }

    #[test]
    fn zero_width_is_empty() {
        assert!(Rect::new(5, 0, 5, 10).is_empty());
        assert!(Rect::new(0, 5, 10, 5).is_empty());
        assert_eq!(Rect::new(5, 0, 5, 10).area(), 0);
        assert!(!Rect::new(5, 5, 5, 10).contains(5, 6));
    }

    #[test]
    fn intersection_overlaps() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 50, 150, 150);
        assert_eq!(a.intersection(&b), Rect::new(50, 50, 100, 100));
        assert!(a.intersects(&b));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 20, 10);
        assert!(!a.intersects(&b));
        assert_eq!(a.intersection_opt(&b), None);
        assert_eq!(a.intersection(&b), Rect::default());
    }

    #[test]
    fn union_ignores_empty() {
        let a = Rect::new(5, 5, 10, 10);
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&a), a);
        assert_eq!(
            a.union(&Rect::new(20, 0, 30, 6)),
            Rect::new(5, 0, 30, 10)
        );
    }

    #[test]
    fn contains_rect_edges() {
        let outer = Rect::new(0, 0, 10, 10);
        assert!(outer.contains_rect(&outer));
        assert!(outer.contains_rect(&Rect::new(2, 2, 10, 10)));
        assert!(!outer.contains_rect(&Rect::new(2, 2, 11, 10)));
        assert!(outer.contains_rect(&Rect::new(50, 50, 50, 50)));
    }

    #[test]
    fn translate_and_move() {
        let r = Rect::from_origin_size(10, 20, 30, 40);
        assert_eq!(r, Rect::new(10, 20, 40, 60));
        assert_eq!(r.translate(-10, 5), Rect::new(0, 25, 30, 65));
        assert_eq!(r.move_to(0, 0), Rect::from_size(30, 40));
        assert_eq!(r.to_local(), Rect::from_size(30, 40));
        assert_eq!(r.origin(), Point::new(10, 20));
    }

    #[test]
    fn extreme_coordinates_saturate() {
        let r = Rect::new(10, 10, 110, 110);
        assert_eq!(r.translate(i32::MAX, 0), Rect::new(i32::MAX, 10, i32::MAX, 110));
        assert_eq!(r.translate(i32::MIN, 0).x1, i32::MIN + 10);

        let moved = r.move_to(i32::MAX - 10, 0);
        assert_eq!(moved, Rect::new(i32::MAX - 10, 0, i32::MAX, 100));
        assert!(moved.is_well_formed());

        assert_eq!(r.checked_move_to(i32::MAX, 0), None);
        assert_eq!(r.checked_move_to(0, i32::MAX - 99), None);
        assert_eq!(
            r.checked_move_to(i32::MAX - 100, 0),
            Some(Rect::new(i32::MAX - 100, 0, i32::MAX, 100))
        );
        assert_eq!(Rect::new(i32::MIN, 0, i32::MAX, 1).width(), i32::MAX);
    }
}
