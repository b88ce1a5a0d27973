//! Binary and text encodings for shapes and index records.
//!
//! Binary encodings are fixed width per field and big-endian, so
//! `from_bytes(to_bytes(s)) == s` holds bit for bit. Text encodings join
//! fields with [`SEPARATOR`]. Composite records encode their base record
//! first and append their own fields; decoding mirrors that through a
//! shared `&mut &str` cursor.
//!
//! ```rust
//! use spatio_grid::codec::Codec;
//! use spatio_grid::ValuedPoint;
//!
//! let sample = ValuedPoint::new(12.5, -3.25, 7);
//! assert_eq!(sample.to_text(), "12.5,-3.25,7");
//! assert_eq!(ValuedPoint::from_text("12.5,-3.25,7")?, sample);
//! assert_eq!(ValuedPoint::from_bytes(&sample.to_bytes())?, sample);
//! # Ok::<(), spatio_grid::GridError>(())
//! ```

pub mod binary;
pub mod registry;
pub mod text;

pub use registry::{AnyShape, Record, ShapeKind};

use crate::error::Result;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use spatio_grid_types::{Point, Rectangle, ValuedPoint};

/// Reserved field separator of the text encoding.
pub const SEPARATOR: char = ',';

/// Binary and text serialization of a record.
pub trait Codec: Sized {
    /// Append the binary encoding to `buf`.
    fn write_binary(&self, buf: &mut impl BufMut);

    /// Decode one record from the front of `buf`, advancing it.
    fn read_binary(buf: &mut impl Buf) -> Result<Self>;

    /// Append the text encoding to `out`.
    fn write_text(&self, out: &mut String);

    /// Decode one record from the front of `input`, leaving the cursor right
    /// after the last consumed field.
    fn read_text(input: &mut &str) -> Result<Self>;

    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_binary(&mut buf);
        buf.freeze()
    }

    /// Decode a buffer holding exactly one record.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        let record = Self::read_binary(&mut buf)?;
        if buf.has_remaining() {
            return Err(crate::GridError::format(format!(
                "{} trailing bytes after record",
                buf.remaining()
            )));
        }
        Ok(record)
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    /// Decode a string holding exactly one record.
    fn from_text(value: &str) -> Result<Self> {
        let mut input = value;
        let record = Self::read_text(&mut input)?;
        text::ensure_consumed(input)?;
        Ok(record)
    }
}

impl Codec for Point {
    fn write_binary(&self, buf: &mut impl BufMut) {
        binary::put_f64(buf, self.x);
        binary::put_f64(buf, self.y);
    }

    fn read_binary(buf: &mut impl Buf) -> Result<Self> {
        let x = binary::get_f64(buf)?;
        let y = binary::get_f64(buf)?;
        Ok(Point::new(x, y))
    }

    fn write_text(&self, out: &mut String) {
        text::write_f64(out, self.x);
        text::write_separator(out);
        text::write_f64(out, self.y);
    }

    fn read_text(input: &mut &str) -> Result<Self> {
        let x = text::read_f64(input)?;
        text::expect_separator(input)?;
        let y = text::read_f64(input)?;
        Ok(Point::new(x, y))
    }
}

impl Codec for ValuedPoint {
    fn write_binary(&self, buf: &mut impl BufMut) {
        self.point.write_binary(buf);
        buf.put_i32(self.value);
    }

    fn read_binary(buf: &mut impl Buf) -> Result<Self> {
        let point = Point::read_binary(buf)?;
        let value = binary::get_i32(buf)?;
        Ok(ValuedPoint { point, value })
    }

    fn write_text(&self, out: &mut String) {
        self.point.write_text(out);
        text::write_separator(out);
        text::write_i32(out, self.value);
    }

    fn read_text(input: &mut &str) -> Result<Self> {
        let point = Point::read_text(input)?;
        text::expect_separator(input)?;
        let value = text::read_i32(input)?;
        Ok(ValuedPoint { point, value })
    }
}

impl Codec for Rectangle {
    fn write_binary(&self, buf: &mut impl BufMut) {
        for v in [self.x1, self.y1, self.x2, self.y2] {
            binary::put_f64(buf, v);
        }
    }

    fn read_binary(buf: &mut impl Buf) -> Result<Self> {
        let x1 = binary::get_f64(buf)?;
        let y1 = binary::get_f64(buf)?;
        let x2 = binary::get_f64(buf)?;
        let y2 = binary::get_f64(buf)?;
        // Stored as-is; corners are already ordered by the writer.
        Ok(Rectangle { x1, y1, x2, y2 })
    }

    fn write_text(&self, out: &mut String) {
        text::write_f64(out, self.x1);
        for v in [self.y1, self.x2, self.y2] {
            text::write_separator(out);
            text::write_f64(out, v);
        }
    }

    fn read_text(input: &mut &str) -> Result<Self> {
        let x1 = text::read_f64(input)?;
        text::expect_separator(input)?;
        let y1 = text::read_f64(input)?;
        text::expect_separator(input)?;
        let x2 = text::read_f64(input)?;
        text::expect_separator(input)?;
        let y2 = text::read_f64(input)?;
        Ok(Rectangle { x1, y1, x2, y2 })
    }
}
