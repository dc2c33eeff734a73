#![forbid(unsafe_code)]

//! Rectangle-list regions.
//!
//! A [`Region`] is the visible area of a window expressed as disjoint
//! rectangles. It is built by the window stack whenever stacking or geometry
//! changes and read by every clipped drawing call.
//!
//! # Invariants
//!
//! 1. Listed rectangles never overlap and are never empty.
//! 2. Every listed rectangle lies inside `extents`.
//! 3. The list is sorted top-to-bottom, then left-to-right, so identical
//!    inputs always give identical rectangle lists.
//! 4. A region that is exactly one rectangle keeps no list (`data == None`);
//!    the empty region has empty `extents` and no list.

use clipwin_core::geometry::Rect;
use smallvec::SmallVec;

/// A 2-D area made of disjoint rectangles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Region {
    extents: Rect,
    data: Option<Vec<Rect>>,
}

impl Region {
    /// The region covering nothing.
    pub const fn empty() -> Self {
        Self {
            extents: Rect::new(0, 0, 0, 0),
            data: None,
        }
    }

    /// A single-rectangle region. Empty rectangles give the empty region.
    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_empty() {
            Self::empty()
        } else {
            Self {
                extents: rect,
                data: None,
            }
        }
    }

    /// Build a region from pieces that are already pairwise disjoint.
    fn from_disjoint(mut rects: Vec<Rect>) -> Self {
        rects.retain(|r| !r.is_empty());
        match rects.len() {
            0 => Self::empty(),
            1 => Self::from_rect(rects[0]),
            _ => {
                rects.sort_by_key(|r| (r.y1, r.x1));
                let extents = rects
                    .iter()
                    .fold(Rect::default(), |acc, r| acc.union(r));
                Self {
                    extents,
                    data: Some(rects),
                }
            }
        }
    }

    /// Bounding rectangle of the whole region.
    #[inline]
    pub const fn extents(&self) -> Rect {
        self.extents
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    /// Number of listed rectangles.
    pub fn num_rects(&self) -> usize {
        match &self.data {
            Some(rects) => rects.len(),
            None if self.extents.is_empty() => 0,
            None => 1,
        }
    }

    /// The rectangles in deterministic top-to-bottom, left-to-right order.
    pub fn rects(&self) -> &[Rect] {
        match &self.data {
            Some(rects) => rects,
            None if self.extents.is_empty() => &[],
            None => std::slice::from_ref(&self.extents),
        }
    }

    /// True when the region is exactly one non-empty rectangle.
    #[inline]
    pub fn is_single_rect(&self) -> bool {
        self.data.is_none() && !self.extents.is_empty()
    }

    /// Return the listed rectangle containing `(x, y)`, if any.
    pub fn contains_point(&self, x: i32, y: i32) -> Option<Rect> {
        if !self.extents.contains(x, y) {
            return None;
        }
        self.rects().iter().find(|r| r.contains(x, y)).copied()
    }

    /// True when every pixel of `rect` is inside the region.
    pub fn covers(&self, rect: &Rect) -> bool {
        Region::from_rect(*rect).subtract(self).is_empty()
    }

    /// Total pixel count.
    pub fn area(&self) -> i64 {
        self.rects().iter().map(Rect::area).sum()
    }

    /// Area common to both regions.
    pub fn intersect(&self, other: &Region) -> Region {
        if !self.extents.intersects(&other.extents) {
            return Region::empty();
        }
        if self.is_single_rect() && other.is_single_rect() {
            return Region::from_rect(self.extents.intersection(&other.extents));
        }
        let mut pieces = Vec::new();
        for a in self.rects() {
            for b in other.rects() {
                if let Some(common) = a.intersection_opt(b) {
                    pieces.push(common);
                }
            }
        }
        Region::from_disjoint(pieces)
    }

    /// Clip the region to a rectangle.
    pub fn intersect_rect(&self, rect: &Rect) -> Region {
        self.intersect(&Region::from_rect(*rect))
    }

    /// Area of `self` not covered by `other`.
    ///
    /// Subtracting something that does not touch the region returns an equal
    /// region; subtracting a cover returns the empty region.
    pub fn subtract(&self, other: &Region) -> Region {
        if !self.extents.intersects(&other.extents) {
            return self.clone();
        }
        let mut pieces: Vec<Rect> = self.rects().to_vec();
        for cut in other.rects() {
            if !cut.intersects(&self.extents) {
                continue;
            }
            let mut next = Vec::with_capacity(pieces.len() + 3);
            for piece in &pieces {
                next.extend(subtract_rect(piece, cut));
            }
            pieces = next;
            if pieces.is_empty() {
                break;
            }
        }
        Region::from_disjoint(pieces)
    }

    /// Remove a rectangle from the region.
    pub fn subtract_rect(&self, rect: &Rect) -> Region {
        self.subtract(&Region::from_rect(*rect))
    }

    /// Area covered by either region.
    pub fn union(&self, other: &Region) -> Region {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut pieces = self.rects().to_vec();
        pieces.extend_from_slice(other.subtract(self).rects());
        Region::from_disjoint(pieces)
    }

    /// Add a rectangle to the region.
    pub fn union_rect(&self, rect: &Rect) -> Region {
        self.union(&Region::from_rect(*rect))
    }

    /// Shift every rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Region {
        Region {
            extents: if self.extents.is_empty() {
                self.extents
            } else {
                self.extents.translate(dx, dy)
            },
            data: self
                .data
                .as_ref()
                .map(|rects| rects.iter().map(|r| r.translate(dx, dy)).collect()),
        }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

/// Split `a − b` into at most four disjoint strips: full-width bands above
/// and below the overlap, then the left and right remainders beside it.
fn subtract_rect(a: &Rect, b: &Rect) -> SmallVec<[Rect; 4]> {
    let mut out = SmallVec::new();
    let Some(overlap) = a.intersection_opt(b) else {
        out.push(*a);
        return out;
    };
    if overlap.y1 > a.y1 {
        out.push(Rect::new(a.x1, a.y1, a.x2, overlap.y1));
    }
    if overlap.y2 < a.y2 {
        out.push(Rect::new(a.x1, overlap.y2, a.x2, a.y2));
    }
    if overlap.x1 > a.x1 {
        out.push(Rect::new(a.x1, overlap.y1, overlap.x1, overlap.y2));
    }
    if overlap.x2 < a.x2 {
        out.push(Rect::new(overlap.x2, overlap.y1, a.x2, overlap.y2));
    }
    out
}
