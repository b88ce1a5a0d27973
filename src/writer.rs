//! Grid writer: routes records into per-cell blocks.
//!
//! One writer serves one task of a partitioning job. Every record is
//! appended to the block of each cell it falls into; closing the writer
//! finishes the blocks and appends one [`Partition`] per non-empty cell to
//! the task's master-index fragment. Cell rectangles are adjusted on close
//! according to the `pack` / `expand` flags.
//!
//! ```rust
//! use spatio_grid::{CellLayout, GridWriter, MemoryStorage, Point, Rectangle};
//! use std::sync::Arc;
//!
//! let layout = CellLayout::uniform(Rectangle::new(0.0, 0.0, 10.0, 10.0), 2, 2)?.into_shared();
//! let storage = Arc::new(MemoryStorage::new());
//! let mut writer = GridWriter::<Point>::new(storage, "out", "task-0", layout)?.with_pack(true);
//!
//! writer.write(&Point::new(1.0, 1.0))?;
//! writer.write(&Point::new(2.0, 3.0))?;
//! writer.close()?;
//!
//! let emitted = writer.emitted();
//! assert_eq!(emitted.len(), 1);
//! assert_eq!(*emitted[0].rect(), Rectangle::new(1.0, 1.0, 2.0, 3.0));
//! # Ok::<(), spatio_grid::GridError>(())
//! ```

use crate::cell::{Cell, SharedLayout};
use crate::codec::Record;
use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::format::{BlockSink, Compression};
use crate::master;
use crate::partition::Partition;
use crate::storage::Storage;
use bytes::BytesMut;
use rustc_hash::FxHashMap;
use spatio_grid_types::Rectangle;
use std::collections::hash_map::Entry;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Lifecycle of a [`GridWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing written yet
    Open,
    Writing,
    /// Blocks are being finished
    Closing,
    Closed,
}

/// An open block of one cell.
struct Block {
    cell: Cell,
    filename: String,
    sink: BlockSink,
    /// Bounding box of every record written so far; meaningless while
    /// `records` is zero
    content: Rectangle,
    /// Like `content`, with records overlapping the cell clipped to it
    packed: Rectangle,
    records: u64,
}

impl Block {
    fn open(
        storage: &dyn Storage,
        dir: &Path,
        task: &str,
        cell: Cell,
        compression: Option<Compression>,
    ) -> Result<Self> {
        let mut filename = format!("{task}_{:05}", cell.id);
        if let Some(codec) = compression {
            filename.push('.');
            filename.push_str(codec.extension());
        }
        let sink = BlockSink::new(storage.create(&dir.join(&filename))?, compression);
        Ok(Self {
            cell,
            filename,
            sink,
            content: Rectangle::default(),
            packed: Rectangle::default(),
            records: 0,
        })
    }

    fn append(&mut self, encoded: &[u8], mbr: &Rectangle) -> Result<()> {
        self.sink.write_all(encoded)?;
        // Records placed here only as the nearest cell keep their full box.
        let clipped = if mbr.overlaps_cell(&self.cell.rect) {
            mbr.intersection(&self.cell.rect).unwrap_or(*mbr)
        } else {
            *mbr
        };
        if self.records == 0 {
            self.content = *mbr;
            self.packed = clipped;
        } else {
            self.content.expand(mbr);
            self.packed.expand(&clipped);
        }
        self.records += 1;
        Ok(())
    }

    /// Rectangle advertised in the master index. Pack takes precedence over
    /// expand.
    fn advertised(&self, pack: bool, expand: bool) -> Rectangle {
        if pack {
            self.packed
        } else if expand {
            self.cell.rect.union(&self.content)
        } else {
            self.cell.rect
        }
    }
}

/// Writes records of type `S` into the blocks of a fixed cell layout.
pub struct GridWriter<S> {
    storage: Arc<dyn Storage>,
    dir: PathBuf,
    task: String,
    layout: SharedLayout,
    pack: bool,
    expand: bool,
    compression: Option<Compression>,
    blocks: FxHashMap<usize, Block>,
    state: WriterState,
    emitted: Vec<Partition>,
    scratch: BytesMut,
    _records: PhantomData<fn(&S)>,
}

impl<S: Record> GridWriter<S> {
    /// Writer for `task`, placing its blocks and master-index fragment in
    /// `dir`. Neither pack nor expand is enabled.
    pub fn new(
        storage: Arc<dyn Storage>,
        dir: impl Into<PathBuf>,
        task: impl Into<String>,
        layout: SharedLayout,
    ) -> Result<Self> {
        let task = task.into();
        // Block and fragment names embed the task; none may look like a
        // master file.
        if task.is_empty()
            || task.contains(['/', '\\', '\n', '\r'])
            || master::is_master_file(&task)
        {
            return Err(GridError::InvalidConfig(format!(
                "invalid task name {task:?}"
            )));
        }
        if layout.is_empty() {
            return Err(GridError::InvalidConfig(
                "cell layout has no cells".to_string(),
            ));
        }
        Ok(Self {
            storage,
            dir: dir.into(),
            task,
            layout,
            pack: false,
            expand: false,
            compression: None,
            blocks: FxHashMap::default(),
            state: WriterState::Open,
            emitted: Vec::new(),
            scratch: BytesMut::new(),
            _records: PhantomData,
        })
    }

    /// Writer configured from a job configuration. The configured shape
    /// type must be `S`.
    pub fn from_config(
        storage: Arc<dyn Storage>,
        dir: impl Into<PathBuf>,
        task: impl Into<String>,
        layout: SharedLayout,
        config: &GridConfig,
    ) -> Result<Self> {
        config.validate().map_err(GridError::InvalidConfig)?;
        if config.shape != S::KIND {
            return Err(GridError::InvalidConfig(format!(
                "configured shape type {} does not match {} records",
                config.shape,
                S::KIND
            )));
        }
        let mut writer = Self::new(storage, dir, task, layout)?
            .with_pack(config.pack)
            .with_expand(config.expand);
        writer.compression = config.compression;
        Ok(writer)
    }

    pub fn with_pack(mut self, pack: bool) -> Self {
        self.pack = pack;
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Partitions emitted by [`close`](Self::close); empty until then.
    pub fn emitted(&self) -> &[Partition] {
        &self.emitted
    }

    /// Append `shape` to the block of every cell it is assigned to.
    pub fn write(&mut self, shape: &S) -> Result<()> {
        match self.state {
            WriterState::Closing | WriterState::Closed => return Err(GridError::WriterClosed),
            WriterState::Open => self.state = WriterState::Writing,
            WriterState::Writing => {}
        }

        let mbr = shape.mbr();
        if !mbr.is_finite() {
            return Err(GridError::format(format!(
                "cannot place a record with non-finite bounds {mbr:?}"
            )));
        }

        self.scratch.clear();
        shape.write_binary(&mut self.scratch);

        for slot in self.layout.assign(shape) {
            let block = match self.blocks.entry(slot) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Block::open(
                    self.storage.as_ref(),
                    &self.dir,
                    &self.task,
                    self.layout.cells()[slot],
                    self.compression,
                )?),
            };
            block.append(&self.scratch, &mbr)?;
        }
        Ok(())
    }

    /// Finish every block and append their partitions to this task's
    /// master-index fragment. Closing a closed writer does nothing.
    ///
    /// The writer is closed afterwards even when finishing fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closing;
        let result = self.finish_blocks();
        self.state = WriterState::Closed;
        result
    }

    fn finish_blocks(&mut self) -> Result<()> {
        let mut blocks: Vec<(usize, Block)> = self.blocks.drain().collect();
        blocks.sort_unstable_by_key(|(slot, _)| *slot);

        let mut partitions = Vec::with_capacity(blocks.len());
        let mut records = 0;
        for (_, mut block) in blocks {
            block.sink.finish()?;
            records += block.records;
            partitions.push(Partition::new(
                block.cell.id,
                block.advertised(self.pack, self.expand),
                block.filename,
            ));
        }

        if !partitions.is_empty() {
            let fragment = master::fragment_path(&self.dir, &self.task);
            let mut out = self.storage.create(&fragment)?;
            master::write_partitions(&mut out, &partitions)?;
            out.flush()?;
        }

        log::info!(
            "task {} wrote {records} records into {} blocks",
            self.task,
            partitions.len()
        );
        self.emitted = partitions;
        Ok(())
    }

    /// Abandon the writer. No partition is emitted; blocks written so far
    /// are left behind unreferenced.
    pub fn abort(&mut self) {
        if self.state == WriterState::Closed {
            return;
        }
        let orphaned = self.blocks.len();
        self.blocks.clear();
        self.state = WriterState::Closed;
        log::warn!("task {} aborted, {orphaned} blocks orphaned", self.task);
    }
}
