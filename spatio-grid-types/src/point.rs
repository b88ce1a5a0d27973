use serde::{Deserialize, Serialize};

/// A 2D point in the dataset's coordinate space.
///
/// # Examples
///
/// ```
/// use spatio_grid_types::Point;
///
/// let point = Point::new(-74.0060, 40.7128);
/// let geo_point: geo::Point = point.into();
/// assert_eq!(geo_point.x(), -74.0060);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.x(), point.y())
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(point: Point) -> Self {
        geo::Point::new(point.x, point.y)
    }
}

/// A point carrying an integer measurement, e.g. a sensor reading or a
/// remote-sensing sample value.
///
/// It is laid out as the plain [`Point`] followed by the value, both in
/// binary and in text form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuedPoint {
    pub point: Point,
    pub value: i32,
}

impl ValuedPoint {
    pub fn new(x: f64, y: f64, value: i32) -> Self {
        Self {
            point: Point::new(x, y),
            value,
        }
    }

    pub fn x(&self) -> f64 {
        self.point.x
    }

    pub fn y(&self) -> f64 {
        self.point.y
    }
}

impl std::fmt::Display for ValuedPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) - {}", self.point.x, self.point.y, self.value)
    }
}
