//! Grid cells and the shared cell layout handed to writers.

use crate::codec::{Codec, binary, text};
use crate::error::{GridError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use smallvec::SmallVec;
use spatio_grid_types::{Rectangle, Shape};
use std::sync::Arc;

/// Stable identity of a grid cell across all blocks written for it.
pub type CellId = i32;

/// A nominal grid rectangle with a stable identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub id: CellId,
    pub rect: Rectangle,
}

impl Cell {
    pub fn new(id: CellId, rect: Rectangle) -> Self {
        Self { id, rect }
    }

    /// Grow this cell to cover `other`; used when merging fragments of the
    /// same logical cell.
    pub fn expand(&mut self, other: &Rectangle) {
        self.rect.expand(other);
    }
}

impl Codec for Cell {
    fn write_binary(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.id);
        self.rect.write_binary(buf);
    }

    fn read_binary(buf: &mut impl Buf) -> Result<Self> {
        let id = binary::get_i32(buf)?;
        let rect = Rectangle::read_binary(buf)?;
        Ok(Cell { id, rect })
    }

    fn write_text(&self, out: &mut String) {
        text::write_i32(out, self.id);
        text::write_separator(out);
        self.rect.write_text(out);
    }

    fn read_text(input: &mut &str) -> Result<Self> {
        let id = text::read_i32(input)?;
        text::expect_separator(input)?;
        let rect = Rectangle::read_text(input)?;
        Ok(Cell { id, rect })
    }
}

/// Serialize a cell table into one blob: a `u32` count followed by the
/// fixed-width cells, in order.
pub fn encode_cells(cells: &[Cell]) -> Bytes {
    let mut buf = BytesMut::with_capacity(binary::U32_LEN + cells.len() * 36);
    buf.put_u32(cells.len() as u32);
    for cell in cells {
        cell.write_binary(&mut buf);
    }
    buf.freeze()
}

pub fn decode_cells(blob: &[u8]) -> Result<Vec<Cell>> {
    let mut buf = blob;
    let count = binary::get_u32(&mut buf)? as usize;
    let mut cells = Vec::with_capacity(count.min(buf.remaining() / 36 + 1));
    for _ in 0..count {
        cells.push(Cell::read_binary(&mut buf)?);
    }
    if buf.has_remaining() {
        return Err(GridError::format(format!(
            "{} trailing bytes after {count} cells",
            buf.remaining()
        )));
    }
    Ok(cells)
}

#[derive(Debug, Clone)]
struct CellEntry {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for CellEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

pub(crate) fn envelope_of(rect: &Rectangle) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.x1, rect.y1], [rect.x2, rect.y2])
}

/// The fixed set of target cells of one partitioning job.
///
/// Built once before any writer starts and shared read-only (through
/// [`SharedLayout`]) by every writer of the job.
#[derive(Debug)]
pub struct CellLayout {
    cells: Vec<Cell>,
    tree: RTree<CellEntry>,
}

pub type SharedLayout = Arc<CellLayout>;

impl CellLayout {
    pub fn new(cells: Vec<Cell>) -> Self {
        let entries = cells
            .iter()
            .enumerate()
            .map(|(slot, cell)| CellEntry {
                slot,
                envelope: envelope_of(&cell.rect),
            })
            .collect();
        Self {
            cells,
            tree: RTree::bulk_load(entries),
        }
    }

    /// A uniform `columns x rows` grid over `bounds`, ids assigned row by
    /// row starting at zero.
    pub fn uniform(bounds: Rectangle, columns: usize, rows: usize) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(GridError::InvalidConfig(
                "grid needs at least one column and one row".to_string(),
            ));
        }
        if !bounds.is_finite() {
            return Err(GridError::InvalidConfig(
                "grid bounds must be finite".to_string(),
            ));
        }
        let cell_w = bounds.width() / columns as f64;
        let cell_h = bounds.height() / rows as f64;
        let mut cells = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for col in 0..columns {
                let x1 = bounds.x1 + col as f64 * cell_w;
                let y1 = bounds.y1 + row as f64 * cell_h;
                // Snap the last column/row to the bounds so rounding never
                // leaves a gap at the outer edge.
                let x2 = if col + 1 == columns { bounds.x2 } else { x1 + cell_w };
                let y2 = if row + 1 == rows { bounds.y2 } else { y1 + cell_h };
                let id = (row * columns + col) as CellId;
                cells.push(Cell::new(id, Rectangle::new(x1, y1, x2, y2)));
            }
        }
        Ok(Self::new(cells))
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn into_shared(self) -> SharedLayout {
        Arc::new(self)
    }

    /// Slots of every cell the shape's rectangle overlaps, using the cells'
    /// half-open edges. Slots come back in layout order.
    pub fn overlapping<S: Shape>(&self, shape: &S) -> SmallVec<[usize; 4]> {
        let mbr = shape.mbr();
        let mut slots: SmallVec<[usize; 4]> = self
            .tree
            .locate_in_envelope_intersecting(&envelope_of(&mbr))
            .filter(|entry| mbr.overlaps_cell(&self.cells[entry.slot].rect))
            .map(|entry| entry.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Slots a shape is written to.
    ///
    /// Normally [`overlapping`](Self::overlapping). A shape that no cell
    /// takes under the half-open rule (it sits on the grid's outer maximum
    /// edge, or outside the grid) goes to the nearest cell so that it stays
    /// reachable through the index.
    pub fn assign<S: Shape>(&self, shape: &S) -> SmallVec<[usize; 4]> {
        let slots = self.overlapping(shape);
        if !slots.is_empty() {
            return slots;
        }
        let center = shape.mbr().center();
        match self.tree.nearest_neighbor(&[center.x, center.y]) {
            Some(entry) => {
                log::debug!(
                    "shape at ({}, {}) outside every cell, assigned to cell {}",
                    center.x,
                    center.y,
                    self.cells[entry.slot].id
                );
                smallvec::smallvec![entry.slot]
            }
            None => SmallVec::new(),
        }
    }
}
