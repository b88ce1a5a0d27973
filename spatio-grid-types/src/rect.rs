use crate::point::Point;
use geo::Rect;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle `(x1, y1) - (x2, y2)`.
///
/// Grid cells treat the minimum edges as inclusive and the maximum edges as
/// exclusive ([`Rectangle::contains_point`]); partition pruning uses the
/// closed overlap test ([`Rectangle::intersects`]) so that a boundary-touching
/// query never misses a block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rectangle {
    /// Create a rectangle, swapping corners where needed so that
    /// `x1 <= x2` and `y1 <= y2`.
    ///
    /// # Examples
    ///
    /// ```
    /// use spatio_grid_types::Rectangle;
    ///
    /// let rect = Rectangle::new(10.0, 10.0, 0.0, 0.0);
    /// assert_eq!(rect, Rectangle::new(0.0, 0.0, 10.0, 10.0));
    /// ```
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Half-open containment: minimum edges inclusive, maximum edges exclusive.
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.x1 && point.x < self.x2 && point.y >= self.y1 && point.y < self.y2
    }

    /// Closed overlap test; rectangles sharing only an edge or a corner
    /// intersect.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        !(self.x2 < other.x1 || self.x1 > other.x2 || self.y2 < other.y1 || self.y1 > other.y2)
    }

    /// Half-open overlap with `other` treated as a grid cell.
    ///
    /// A degenerate `self` (a point) overlaps exactly the cell that
    /// [`contains_point`](Self::contains_point) would pick.
    pub fn overlaps_cell(&self, cell: &Rectangle) -> bool {
        self.x1 < cell.x2 && cell.x1 <= self.x2 && self.y1 < cell.y2 && cell.y1 <= self.y2
    }

    /// Whether `other` lies completely inside this rectangle (closed edges).
    pub fn contains(&self, other: &Rectangle) -> bool {
        other.x1 >= self.x1 && other.x2 <= self.x2 && other.y1 >= self.y1 && other.y2 <= self.y2
    }

    /// Smallest rectangle covering both inputs.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Grow this rectangle in place to cover `other`.
    pub fn expand(&mut self, other: &Rectangle) {
        *self = self.union(other);
    }

    /// Overlap of the two rectangles with closed edges, `None` when they
    /// are disjoint.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        self.intersects(other).then(|| Rectangle {
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            x2: self.x2.min(other.x2),
            y2: self.y2.min(other.y2),
        })
    }
}

impl From<Rect<f64>> for Rectangle {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<Rectangle> for Rect<f64> {
    fn from(rect: Rectangle) -> Self {
        Rect::new(
            geo::coord! { x: rect.x1, y: rect.y1 },
            geo::coord! { x: rect.x2, y: rect.y2 },
        )
    }
}
