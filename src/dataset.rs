//! Dataset-level lookups: locating a directory's master index, listing its
//! data blocks and passing the cell table between processes.

use crate::cell::{Cell, decode_cells, encode_cells};
use crate::error::{GridError, Result};
use crate::global_index::GlobalIndex;
use crate::master::{self, is_compact_name, is_master_file, is_replicated_name};
use crate::storage::{BlobStatus, Storage, is_visible};
use std::path::{Path, PathBuf};

/// Master file of `dir`, or `None` when the directory is not indexed.
pub fn master_file(storage: &dyn Storage, dir: &Path) -> Result<Option<BlobStatus>> {
    let entries = match storage.list(dir) {
        Ok(entries) => entries,
        Err(GridError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut masters: Vec<BlobStatus> = entries
        .into_iter()
        .filter(|entry| !entry.is_dir && is_master_file(entry.name()))
        .collect();
    match masters.len() {
        0 => Ok(None),
        1 => Ok(masters.pop()),
        count => Err(GridError::MultipleMasterFiles {
            dir: dir.to_path_buf(),
            count,
        }),
    }
}

/// Build the global index of the dataset in `dir`.
///
/// Returns `Ok(None)` for a directory without a master file, which callers
/// read as a plain, unpartitioned dataset.
pub fn global_index(storage: &dyn Storage, dir: &Path) -> Result<Option<GlobalIndex>> {
    let Some(master) = master_file(storage, dir)? else {
        return Ok(None);
    };
    let partitions = master::read_master(storage, &master.path)?;

    let name = master.name();
    let mut index = GlobalIndex::new();
    index.bulk_load(partitions);
    index.set_compact(is_compact_name(name));
    index.set_replicated(is_replicated_name(name));
    log::debug!(
        "loaded {} partitions from {} (compact: {}, replicated: {})",
        index.len(),
        master.path.display(),
        index.is_compact(),
        index.is_replicated()
    );
    Ok(Some(index))
}

/// The logical cells of an indexed dataset, fragments merged by cell id.
pub fn cells_of(storage: &dyn Storage, dir: &Path) -> Result<Option<Vec<Cell>>> {
    Ok(global_index(storage, dir)?.map(|index| index.cells()))
}

/// Data files of a dataset: the blocks listed in its master index, or every
/// visible file when it is not indexed. A plain file is its own only block.
pub fn data_blocks(storage: &dyn Storage, path: &Path) -> Result<Vec<PathBuf>> {
    if !storage.status(path)?.is_dir {
        return Ok(vec![path.to_path_buf()]);
    }
    if let Some(index) = global_index(storage, path)? {
        return Ok(index.iter().map(|p| path.join(&p.filename)).collect());
    }
    Ok(storage
        .list(path)?
        .into_iter()
        .filter(|entry| !entry.is_dir && is_visible(entry.name()))
        .map(|entry| entry.path)
        .collect())
}

/// Publish the cell table of `job` as a uniquely named `.cells` file and
/// return its path. Workers load it back with [`load_cells`].
pub fn publish_cells(storage: &dyn Storage, job: &str, cells: &[Cell]) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{job}_{}.cells", uuid::Uuid::new_v4().simple()));
    storage.write_all(&path, &encode_cells(cells))?;
    log::debug!("published {} cells to {}", cells.len(), path.display());
    Ok(path)
}

pub fn load_cells(storage: &dyn Storage, path: &Path) -> Result<Vec<Cell>> {
    decode_cells(&storage.read_all(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::{MasterIndexKind, fragment_path, write_partitions};
    use crate::partition::Partition;
    use crate::storage::MemoryStorage;
    use spatio_grid_types::Rectangle;

    fn indexed(storage: &MemoryStorage, dir: &Path, kind: MasterIndexKind, parts: &[Partition]) {
        let mut out = storage.create(&fragment_path(dir, "t0")).unwrap();
        write_partitions(&mut out, parts).unwrap();
        drop(out);
        master::commit_master_index(storage, dir, kind).unwrap();
    }

    #[test]
    fn test_unindexed_directory() {
        let storage = MemoryStorage::new();
        storage.write_all(Path::new("plain/a.csv"), b"1,2").unwrap();
        assert!(global_index(&storage, Path::new("plain")).unwrap().is_none());
        assert!(global_index(&storage, Path::new("missing")).unwrap().is_none());
    }

    #[test]
    fn test_two_master_files_is_configuration_error() {
        let storage = MemoryStorage::new();
        storage.write_all(Path::new("d/_master.grid"), b"").unwrap();
        storage.write_all(Path::new("d/_master.rtree"), b"").unwrap();
        let err = global_index(&storage, Path::new("d")).unwrap_err();
        assert!(matches!(err, GridError::MultipleMasterFiles { count: 2, .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_flags_follow_master_name() {
        let storage = MemoryStorage::new();
        let parts = [Partition::new(0, Rectangle::new(0.0, 0.0, 1.0, 1.0), "b0")];
        indexed(&storage, Path::new("rp"), MasterIndexKind::RPlusTree, &parts);
        let index = global_index(&storage, Path::new("rp")).unwrap().unwrap();
        assert!(index.is_compact());
        assert!(index.is_replicated());
        assert_eq!(index.partitions(), &parts);

        indexed(&storage, Path::new("g"), MasterIndexKind::Grid, &parts);
        let index = global_index(&storage, Path::new("g")).unwrap().unwrap();
        assert!(!index.is_compact());
        assert!(index.is_replicated());
    }

    #[test]
    fn test_cells_of_merges_fragments() {
        let storage = MemoryStorage::new();
        let parts = [
            Partition::new(5, Rectangle::new(0.0, 0.0, 5.0, 5.0), "a_00005"),
            Partition::new(5, Rectangle::new(3.0, 3.0, 8.0, 8.0), "b_00005"),
            Partition::new(6, Rectangle::new(8.0, 0.0, 9.0, 1.0), "a_00006"),
        ];
        indexed(&storage, Path::new("d"), MasterIndexKind::Grid, &parts);
        let cells = cells_of(&storage, Path::new("d")).unwrap().unwrap();
        assert_eq!(
            cells,
            vec![
                Cell::new(5, Rectangle::new(0.0, 0.0, 8.0, 8.0)),
                Cell::new(6, Rectangle::new(8.0, 0.0, 9.0, 1.0)),
            ]
        );
    }

    #[test]
    fn test_data_blocks() {
        let storage = MemoryStorage::new();
        storage.write_all(Path::new("raw/part-0"), b"x").unwrap();
        storage.write_all(Path::new("raw/.part-0.crc"), b"x").unwrap();
        storage.write_all(Path::new("raw/_SUCCESS"), b"").unwrap();
        assert_eq!(
            data_blocks(&storage, Path::new("raw")).unwrap(),
            vec![PathBuf::from("raw/part-0")]
        );

        let parts = [Partition::new(1, Rectangle::new(0.0, 0.0, 1.0, 1.0), "t0_00001")];
        indexed(&storage, Path::new("idx"), MasterIndexKind::Grid, &parts);
        storage.write_all(Path::new("idx/stray"), b"x").unwrap();
        assert_eq!(
            data_blocks(&storage, Path::new("idx")).unwrap(),
            vec![PathBuf::from("idx/t0_00001")]
        );
        assert_eq!(
            data_blocks(&storage, Path::new("raw/part-0")).unwrap(),
            vec![PathBuf::from("raw/part-0")]
        );
    }

    #[test]
    fn test_publish_and_load_cells() {
        let storage = MemoryStorage::new();
        let cells: Vec<Cell> = (0..1000)
            .map(|i| {
                let f = i as f64 * 0.1;
                Cell::new(i, Rectangle::new(f, f, f + 0.1, f + 0.3))
            })
            .collect();
        let first = publish_cells(&storage, "job", &cells).unwrap();
        let second = publish_cells(&storage, "job", &cells).unwrap();
        assert_ne!(first, second);
        assert!(first.to_str().unwrap().ends_with(".cells"));
        assert_eq!(load_cells(&storage, &first).unwrap(), cells);
    }
}
