//! Grid partitioning of spatial datasets with a master index of blocks.
//!
//! Writers route records into one block per grid cell and record every
//! block in a master index; readers load that index into a [`GlobalIndex`]
//! and prune blocks with range queries.
//!
//! ```rust
//! use spatio_grid::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(MemoryStorage::new());
//! let layout = CellLayout::uniform(Rectangle::new(0.0, 0.0, 10.0, 10.0), 2, 2)?.into_shared();
//!
//! let mut writer = GridWriter::<Point>::new(storage.clone(), "cities", "task-0", layout)?
//!     .with_pack(true);
//! writer.write(&Point::new(2.0, 2.0))?;
//! writer.write(&Point::new(8.0, 7.0))?;
//! writer.close()?;
//! commit_master_index(storage.as_ref(), Path::new("cities"), MasterIndexKind::Grid)?;
//!
//! let index = global_index(storage.as_ref(), Path::new("cities"))?.expect("indexed");
//! let hits: Vec<_> = index.range_query(&Rectangle::new(6.0, 6.0, 9.0, 9.0))?.collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].cell_id(), 3);
//! # Ok::<(), spatio_grid::GridError>(())
//! ```

pub mod cell;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod global_index;
pub mod master;
pub mod partition;
pub mod storage;
pub mod writer;

pub use cell::{Cell, CellId, CellLayout, SharedLayout, decode_cells, encode_cells};
pub use config::GridConfig;
pub use dataset::{cells_of, data_blocks, global_index, load_cells, publish_cells};
pub use error::{GridError, Result};
pub use format::{Compression, is_locally_indexed, read_block, write_signature};
pub use global_index::{GlobalIndex, RangeQuery, merge_cells};
pub use master::{MasterIndexKind, commit_master_index};
pub use partition::Partition;
pub use storage::{LocalStorage, MemoryStorage, Storage};
pub use writer::{GridWriter, WriterState};

pub use spatio_grid_types::{Point, Rectangle, Shape, ValuedPoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GridError, Result};

    pub use crate::{Cell, CellLayout, GlobalIndex, GridConfig, GridWriter, Partition};

    pub use crate::{MasterIndexKind, commit_master_index, global_index};

    pub use crate::{LocalStorage, MemoryStorage, Storage};

    pub use crate::codec::{Codec, Record, ShapeKind};

    pub use spatio_grid_types::{Point, Rectangle, Shape, ValuedPoint};
}
