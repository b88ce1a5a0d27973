//! Master-index files.
//!
//! A master index is a text file holding one [`Partition`] per line. Each
//! writer appends its partitions to a private fragment file; committing the
//! job concatenates the fragments into the dataset's single master file.

use crate::codec::Codec;
use crate::dataset;
use crate::error::{GridError, Result};
use crate::partition::Partition;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Substring that marks a file as a dataset's master index.
pub const MASTER_MARKER: &str = "_master";

const FRAGMENT_PREFIX: &str = "_fragment-";
const FRAGMENT_SUFFIX: &str = ".master";
const STAGING_NAME: &str = "_commit.tmp";

/// Layout recorded in a master file's name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterIndexKind {
    /// Plain grid; records overlapping several cells are copied into each.
    #[default]
    Grid,
    /// Blocks carry a local R-tree.
    #[serde(rename = "rtree")]
    RTree,
    /// Blocks carry a local R+-tree and records are replicated.
    #[serde(rename = "r+tree")]
    RPlusTree,
}

impl MasterIndexKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            MasterIndexKind::Grid => "grid",
            MasterIndexKind::RTree => "rtree",
            MasterIndexKind::RPlusTree => "r+tree",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{MASTER_MARKER}.{}", self.suffix())
    }
}

impl fmt::Display for MasterIndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

pub fn is_master_file(name: &str) -> bool {
    name.contains(MASTER_MARKER)
}

/// Blocks of a dataset whose master file has this name are locally indexed.
pub fn is_compact_name(name: &str) -> bool {
    name.ends_with("rtree") || name.ends_with("r+tree")
}

/// Records of a dataset whose master file has this name may be duplicated
/// across partitions.
pub fn is_replicated_name(name: &str) -> bool {
    name.ends_with("r+tree") || name.ends_with("grid")
}

/// Path of the fragment a writer for `task` appends to.
pub fn fragment_path(dir: &Path, task: &str) -> PathBuf {
    dir.join(format!("{FRAGMENT_PREFIX}{task}{FRAGMENT_SUFFIX}"))
}

fn is_fragment(name: &str) -> bool {
    name.starts_with(FRAGMENT_PREFIX) && name.ends_with(FRAGMENT_SUFFIX)
}

/// Write partitions as master-index lines.
pub fn write_partitions<'a>(
    out: &mut impl Write,
    partitions: impl IntoIterator<Item = &'a Partition>,
) -> Result<()> {
    let mut line = String::new();
    for partition in partitions {
        if partition.filename.contains(['\n', '\r']) {
            return Err(GridError::format(format!(
                "block name of cell {} contains a line break",
                partition.cell_id()
            )));
        }
        line.clear();
        partition.write_text(&mut line);
        line.push('\n');
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Parse a master-index file. Blank lines are skipped; any other malformed
/// line fails the whole read.
pub fn read_master(storage: &dyn Storage, path: &Path) -> Result<Vec<Partition>> {
    let reader = BufReader::new(storage.open(path)?);
    let mut partitions = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let partition = Partition::from_text(line).map_err(|e| {
            GridError::format(format!("{}:{}: {e}", path.display(), number + 1))
        })?;
        if !partition.rect().is_finite() {
            return Err(GridError::format(format!(
                "{}:{}: non-finite rectangle for cell {}",
                path.display(),
                number + 1,
                partition.cell_id()
            )));
        }
        partitions.push(partition);
    }
    Ok(partitions)
}

/// Concatenate every writer fragment in `dir` into the dataset's master file
/// and remove the fragments. Returns the path of the master file.
///
/// Committing a directory without fragments produces an empty master file;
/// the dataset is then indexed with no partitions. A directory that already
/// has a master file is not committed again.
pub fn commit_master_index(
    storage: &dyn Storage,
    dir: &Path,
    kind: MasterIndexKind,
) -> Result<PathBuf> {
    if let Some(existing) = dataset::master_file(storage, dir)? {
        return Err(GridError::InvalidConfig(format!(
            "{} is already committed as {}",
            dir.display(),
            existing.name()
        )));
    }

    let fragments: Vec<PathBuf> = match storage.list(dir) {
        Ok(entries) => entries
            .into_iter()
            .filter(|entry| !entry.is_dir && is_fragment(entry.name()))
            .map(|entry| entry.path)
            .collect(),
        Err(GridError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    // Readers never see a partially written master file.
    let staging = dir.join(STAGING_NAME);
    let mut out = storage.create(&staging)?;
    for fragment in &fragments {
        let data = storage.read_all(fragment)?;
        out.write_all(&data)?;
    }
    out.flush()?;
    drop(out);

    let master = dir.join(kind.file_name());
    storage.rename(&staging, &master)?;

    for fragment in &fragments {
        storage.delete(fragment)?;
    }
    log::info!(
        "committed {} master index fragments into {}",
        fragments.len(),
        master.display()
    );
    Ok(master)
}
