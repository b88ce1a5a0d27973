//! Closed registry of shape types.
//!
//! A dataset's record type is named by a [`ShapeKind`] tag in configuration.
//! [`AnyShape`] carries a value of any registered kind, which is how a shape
//! (for example a query rectangle) travels inside a configuration string.

use super::{Codec, SEPARATOR, text};
use crate::error::{GridError, Result};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use spatio_grid_types::{Point, Rectangle, Shape, ValuedPoint};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Point,
    Rectangle,
    ValuedPoint,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Point, ShapeKind::Rectangle, ShapeKind::ValuedPoint];

    pub fn tag(&self) -> &'static str {
        match self {
            ShapeKind::Point => "point",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::ValuedPoint => "valued_point",
        }
    }

    /// A default-valued shape of this kind.
    pub fn stock(&self) -> AnyShape {
        match self {
            ShapeKind::Point => AnyShape::Point(Point::default()),
            ShapeKind::Rectangle => AnyShape::Rectangle(Rectangle::default()),
            ShapeKind::ValuedPoint => AnyShape::ValuedPoint(ValuedPoint::default()),
        }
    }

    pub fn read_binary(&self, buf: &mut impl Buf) -> Result<AnyShape> {
        Ok(match self {
            ShapeKind::Point => AnyShape::Point(Point::read_binary(buf)?),
            ShapeKind::Rectangle => AnyShape::Rectangle(Rectangle::read_binary(buf)?),
            ShapeKind::ValuedPoint => AnyShape::ValuedPoint(ValuedPoint::read_binary(buf)?),
        })
    }

    pub fn read_text(&self, input: &mut &str) -> Result<AnyShape> {
        Ok(match self {
            ShapeKind::Point => AnyShape::Point(Point::read_text(input)?),
            ShapeKind::Rectangle => AnyShape::Rectangle(Rectangle::read_text(input)?),
            ShapeKind::ValuedPoint => AnyShape::ValuedPoint(ValuedPoint::read_text(input)?),
        })
    }
}

/// A shape type a dataset can hold, tied to its [`ShapeKind`] tag.
pub trait Record: Shape + Codec {
    const KIND: ShapeKind;
}

impl Record for Point {
    const KIND: ShapeKind = ShapeKind::Point;
}

impl Record for Rectangle {
    const KIND: ShapeKind = ShapeKind::Rectangle;
}

impl Record for ValuedPoint {
    const KIND: ShapeKind = ShapeKind::ValuedPoint;
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ShapeKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| GridError::InvalidConfig(format!("unknown shape type '{s}'")))
    }
}

/// A shape of any registered kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnyShape {
    Point(Point),
    Rectangle(Rectangle),
    ValuedPoint(ValuedPoint),
}

impl AnyShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            AnyShape::Point(_) => ShapeKind::Point,
            AnyShape::Rectangle(_) => ShapeKind::Rectangle,
            AnyShape::ValuedPoint(_) => ShapeKind::ValuedPoint,
        }
    }

    pub fn write_binary(&self, buf: &mut impl BufMut) {
        match self {
            AnyShape::Point(s) => s.write_binary(buf),
            AnyShape::Rectangle(s) => s.write_binary(buf),
            AnyShape::ValuedPoint(s) => s.write_binary(buf),
        }
    }

    pub fn write_text(&self, out: &mut String) {
        match self {
            AnyShape::Point(s) => s.write_text(out),
            AnyShape::Rectangle(s) => s.write_text(out),
            AnyShape::ValuedPoint(s) => s.write_text(out),
        }
    }

    /// `"<tag>,<shape text>"`, suitable for a single configuration value.
    ///
    /// ```rust
    /// use spatio_grid::codec::AnyShape;
    /// use spatio_grid::Rectangle;
    ///
    /// let query = AnyShape::Rectangle(Rectangle::new(0.0, 0.0, 10.0, 5.0));
    /// let encoded = query.to_tagged_text();
    /// assert_eq!(encoded, "rectangle,0.0,0.0,10.0,5.0");
    /// assert_eq!(AnyShape::from_tagged_text(&encoded)?, query);
    /// # Ok::<(), spatio_grid::GridError>(())
    /// ```
    pub fn to_tagged_text(&self) -> String {
        let mut out = String::from(self.kind().tag());
        text::write_separator(&mut out);
        self.write_text(&mut out);
        out
    }

    pub fn from_tagged_text(value: &str) -> Result<Self> {
        let (tag, body) = value
            .split_once(SEPARATOR)
            .ok_or_else(|| GridError::format(format!("missing shape tag in {value:?}")))?;
        let kind: ShapeKind = tag.parse()?;
        let mut input = body;
        let shape = kind.read_text(&mut input)?;
        text::ensure_consumed(input)?;
        Ok(shape)
    }
}

impl Shape for AnyShape {
    fn mbr(&self) -> Rectangle {
        match self {
            AnyShape::Point(s) => s.mbr(),
            AnyShape::Rectangle(s) => s.mbr(),
            AnyShape::ValuedPoint(s) => s.mbr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for kind in ShapeKind::ALL {
            assert_eq!(kind.tag().parse::<ShapeKind>().unwrap(), kind);
            assert_eq!(kind.stock().kind(), kind);
        }
        assert!("polygon".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn test_tagged_text_round_trip() {
        let shapes = [
            AnyShape::Point(Point::new(1.0, 2.0)),
            AnyShape::Rectangle(Rectangle::new(0.0, 0.0, 4.5, 9.0)),
            AnyShape::ValuedPoint(ValuedPoint::new(-3.0, 7.25, 12)),
        ];
        for shape in shapes {
            let encoded = shape.to_tagged_text();
            assert_eq!(AnyShape::from_tagged_text(&encoded).unwrap(), shape);
        }
    }

    #[test]
    fn test_tagged_text_errors() {
        assert!(AnyShape::from_tagged_text("point").unwrap_err().is_format_error());
        assert!(
            AnyShape::from_tagged_text("blob,1,2")
                .unwrap_err()
                .is_configuration_error()
        );
        assert!(AnyShape::from_tagged_text("point,1,2,3").is_err());
    }

    #[test]
    fn test_kind_binary_dispatch() {
        let shape = AnyShape::ValuedPoint(ValuedPoint::new(1.0, 1.0, 5));
        let mut buf = bytes::BytesMut::new();
        shape.write_binary(&mut buf);
        let mut view = &buf[..];
        let decoded = ShapeKind::ValuedPoint.read_binary(&mut view).unwrap();
        assert_eq!(decoded, shape);
        assert!(view.is_empty());
    }

    #[test]
    fn test_record_kinds_match_stock() {
        assert_eq!(ShapeKind::Point.stock(), AnyShape::Point(Point::default()));
        assert_eq!(<Point as Record>::KIND, ShapeKind::Point);
        assert_eq!(<Rectangle as Record>::KIND, ShapeKind::Rectangle);
        assert_eq!(<ValuedPoint as Record>::KIND, ShapeKind::ValuedPoint);
    }

    #[test]
    fn test_serde_tag() {
        let json = serde_json::to_string(&ShapeKind::ValuedPoint).unwrap();
        assert_eq!(json, "\"valued_point\"");
    }
}
