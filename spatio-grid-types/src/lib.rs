//! # spatio-grid-types
//!
//! Geometry primitives for the spatio-grid partitioner.
//!
//! - **Points**: [`Point`], [`ValuedPoint`]
//! - **Rectangles**: [`Rectangle`], the axis-aligned box used for cells,
//!   partitions and range queries
//!
//! Every type implements [`Shape`], which exposes the minimum bounding
//! rectangle used to route a record to its grid cell. All types are
//! serializable with Serde and convert to and from the `geo` crate's
//! primitives.
//!
//! ## Examples
//!
//! ```rust
//! use spatio_grid_types::{Point, Rectangle, Shape};
//!
//! let point = Point::new(3.0, 4.0);
//! let cell = Rectangle::new(0.0, 0.0, 5.0, 5.0);
//! assert!(cell.contains_point(&point));
//! assert_eq!(point.mbr(), Rectangle::new(3.0, 4.0, 3.0, 4.0));
//! ```

pub mod point;
pub mod rect;

pub use point::{Point, ValuedPoint};
pub use rect::Rectangle;

/// A spatial record that can be routed to a grid cell.
pub trait Shape: Clone + std::fmt::Debug {
    /// Minimum bounding rectangle of the shape.
    fn mbr(&self) -> Rectangle;
}

impl Shape for Point {
    fn mbr(&self) -> Rectangle {
        Rectangle::new(self.x, self.y, self.x, self.y)
    }
}

impl Shape for ValuedPoint {
    fn mbr(&self) -> Rectangle {
        self.point.mbr()
    }
}

impl Shape for Rectangle {
    fn mbr(&self) -> Rectangle {
        *self
    }
}
