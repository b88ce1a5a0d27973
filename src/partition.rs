//! Master-index entries.

use crate::cell::{Cell, CellId};
use crate::codec::{Codec, binary, text};
use crate::error::{GridError, Result};
use bytes::{Buf, BufMut};
use spatio_grid_types::{Rectangle, Shape};

/// One physical block of a partitioned dataset: the cell it belongs to, the
/// rectangle it advertises, and the file holding its records.
///
/// The rectangle is that of the block's actual content when the writer
/// packed it, the nominal cell grown over its content when the writer
/// expanded it, and the nominal cell otherwise. Several partitions share a
/// cell id when parallel writers each produced a fragment of that cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub cell: Cell,
    pub filename: String,
}

impl Partition {
    pub fn new(cell_id: CellId, rect: Rectangle, filename: impl Into<String>) -> Self {
        Self {
            cell: Cell::new(cell_id, rect),
            filename: filename.into(),
        }
    }

    pub fn cell_id(&self) -> CellId {
        self.cell.id
    }

    pub fn rect(&self) -> &Rectangle {
        &self.cell.rect
    }
}

impl Shape for Partition {
    fn mbr(&self) -> Rectangle {
        self.cell.rect
    }
}

/// Text form: `cellId,x1,y1,x2,y2,filename`. The file name is the last
/// field and runs to the end of the input, so it may itself contain the
/// separator.
impl Codec for Partition {
    fn write_binary(&self, buf: &mut impl BufMut) {
        self.cell.write_binary(buf);
        binary::put_str(buf, &self.filename);
    }

    fn read_binary(buf: &mut impl Buf) -> Result<Self> {
        let cell = Cell::read_binary(buf)?;
        let filename = binary::get_string(buf)?;
        Ok(Partition { cell, filename })
    }

    fn write_text(&self, out: &mut String) {
        self.cell.write_text(out);
        text::write_separator(out);
        out.push_str(&self.filename);
    }

    fn read_text(input: &mut &str) -> Result<Self> {
        let cell = Cell::read_text(input)?;
        text::expect_separator(input)?;
        let filename = text::take_rest(input);
        if filename.is_empty() {
            return Err(GridError::format(format!(
                "partition of cell {} has no file name",
                cell.id
            )));
        }
        Ok(Partition {
            cell,
            filename: filename.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_text() {
        let p = Partition::new(5, Rectangle::new(0.0, 0.0, 5.0, 5.0), "part-00000_00005");
        assert_eq!(p.to_text(), "5,0.0,0.0,5.0,5.0,part-00000_00005");
        assert_eq!(Partition::from_text(&p.to_text()).unwrap(), p);
    }

    #[test]
    fn test_filename_with_separator() {
        let p = Partition::new(1, Rectangle::new(0.0, 0.0, 1.0, 1.0), "odd,name.gz");
        assert_eq!(Partition::from_text(&p.to_text()).unwrap(), p);
    }

    #[test]
    fn test_partition_binary() {
        let p = Partition::new(-2, Rectangle::new(1.5, 2.5, 3.5, 4.5), "block");
        let bytes = p.to_bytes();
        assert_eq!(bytes.len(), 36 + 4 + 5);
        assert_eq!(Partition::from_bytes(&bytes).unwrap(), p);
    }

    #[test]
    fn test_missing_filename() {
        assert!(Partition::from_text("1,0,0,1,1").is_err());
        assert!(Partition::from_text("1,0,0,1,1,").is_err());
    }

    #[test]
    fn test_accessors() {
        let p = Partition::new(3, Rectangle::new(0.0, 1.0, 2.0, 3.0), "f");
        assert_eq!(p.cell_id(), 3);
        assert_eq!(p.rect().y2, 3.0);
        assert_eq!(p.mbr(), *p.rect());
    }
}
