//! Storage backend abstraction for spatio-grid
//!
//! Datasets, blocks and master indexes are named byte blobs inside a
//! directory hierarchy. This module provides the trait every backend
//! implements plus two backends: [`LocalStorage`] over the local file system
//! and [`MemoryStorage`] for tests and single-process pipelines.
//!
//! All paths are relative to the backend's namespace.

use crate::error::{GridError, Result};
use bytes::{Buf, Bytes};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Trait for storage backend implementations
///
/// Implementations must be shareable between writers running on different
/// threads; every method takes `&self`.
pub trait Storage: Send + Sync {
    /// Open a blob for reading
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>>;

    /// Create (or truncate) a blob for writing, creating parent directories
    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    /// Metadata of a blob or directory
    fn status(&self, path: &Path) -> Result<BlobStatus>;

    /// Immediate children of a directory
    fn list(&self, dir: &Path) -> Result<Vec<BlobStatus>>;

    /// Check if a blob or directory exists
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Delete a blob and report whether it existed
    fn delete(&self, path: &Path) -> Result<bool>;

    /// Move a blob to a new name, replacing any blob already there
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Read a whole blob
    fn read_all(&self, path: &Path) -> Result<Bytes> {
        let mut reader = self.open(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Replace a blob with `data`
    fn write_all(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut writer = self.create(path)?;
        writer.write_all(data)?;
        writer.flush()?;
        Ok(())
    }
}

/// Blob or directory metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStatus {
    pub path: PathBuf,
    pub len: u64,
    pub is_dir: bool,
}

impl BlobStatus {
    /// Last path component
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// Whether a blob name denotes data rather than bookkeeping: names starting
/// with `_` or `.` (master indexes, fragments, caches) are hidden.
pub fn is_visible(name: &str) -> bool {
    !name.starts_with('_') && !name.starts_with('.')
}

fn not_found(path: &Path) -> GridError {
    GridError::NotFound(path.to_path_buf())
}

fn map_io(err: io::Error, path: &Path) -> GridError {
    if err.kind() == io::ErrorKind::NotFound {
        not_found(path)
    } else {
        GridError::Io(err)
    }
}

/// Local file system storage rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn relative(&self, full: &Path) -> PathBuf {
        full.strip_prefix(&self.root).unwrap_or(full).to_path_buf()
    }
}

impl Storage for LocalStorage {
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.resolve(path)).map_err(|e| map_io(e, path))?;
        Ok(Box::new(file))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(File::create(full)?))
    }

    fn status(&self, path: &Path) -> Result<BlobStatus> {
        let meta = fs::metadata(self.resolve(path)).map_err(|e| map_io(e, path))?;
        Ok(BlobStatus {
            path: path.to_path_buf(),
            len: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn list(&self, dir: &Path) -> Result<Vec<BlobStatus>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(dir)).map_err(|e| map_io(e, dir))? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(BlobStatus {
                path: self.relative(&entry.path()),
                len: meta.len(),
                is_dir: meta.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path);
        match fs::metadata(&full) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full)?,
            Ok(_) => fs::remove_file(&full)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let target = self.resolve(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.resolve(from), target).map_err(|e| map_io(e, from))
    }
}

type BlobMap = Arc<RwLock<BTreeMap<PathBuf, Bytes>>>;

/// In-memory storage backend using BTreeMap
///
/// Directories exist implicitly while they contain at least one blob.
/// Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: BlobMap,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs stored
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn is_dir(blobs: &BTreeMap<PathBuf, Bytes>, path: &Path) -> bool {
        blobs
            .keys()
            .any(|key| key != path && key.starts_with(path))
    }
}

/// Buffers writes and publishes the content on every flush and on drop.
struct MemoryWriter {
    path: PathBuf,
    buf: Vec<u8>,
    blobs: BlobMap,
}

impl MemoryWriter {
    fn publish(&self) {
        self.blobs
            .write()
            .insert(self.path.clone(), Bytes::copy_from_slice(&self.buf));
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

impl Storage for MemoryStorage {
    fn open(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let data = self
            .blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))?;
        Ok(Box::new(data.reader()))
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        self.blobs.write().insert(path.to_path_buf(), Bytes::new());
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            buf: Vec::new(),
            blobs: Arc::clone(&self.blobs),
        }))
    }

    fn status(&self, path: &Path) -> Result<BlobStatus> {
        let blobs = self.blobs.read();
        if let Some(data) = blobs.get(path) {
            return Ok(BlobStatus {
                path: path.to_path_buf(),
                len: data.len() as u64,
                is_dir: false,
            });
        }
        if Self::is_dir(&blobs, path) {
            return Ok(BlobStatus {
                path: path.to_path_buf(),
                len: 0,
                is_dir: true,
            });
        }
        Err(not_found(path))
    }

    fn list(&self, dir: &Path) -> Result<Vec<BlobStatus>> {
        let blobs = self.blobs.read();
        let mut entries = Vec::new();
        let mut subdirs = BTreeSet::new();
        for (key, data) in blobs.iter() {
            let Ok(rest) = key.strip_prefix(dir) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            if components.next().is_some() {
                subdirs.insert(dir.join(first));
            } else {
                entries.push(BlobStatus {
                    path: key.clone(),
                    len: data.len() as u64,
                    is_dir: false,
                });
            }
        }
        if entries.is_empty() && subdirs.is_empty() {
            return Err(not_found(dir));
        }
        entries.extend(subdirs.into_iter().map(|path| BlobStatus {
            path,
            len: 0,
            is_dir: true,
        }));
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let blobs = self.blobs.read();
        Ok(blobs.contains_key(path) || Self::is_dir(&blobs, path))
    }

    fn delete(&self, path: &Path) -> Result<bool> {
        let mut blobs = self.blobs.write();
        if blobs.remove(path).is_some() {
            return Ok(true);
        }
        let before = blobs.len();
        blobs.retain(|key, _| !key.starts_with(path));
        Ok(blobs.len() != before)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut blobs = self.blobs.write();
        let data = blobs.remove(from).ok_or_else(|| not_found(from))?;
        blobs.insert(to.to_path_buf(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(storage: &dyn Storage) {
        let dir = Path::new("dataset");
        storage.write_all(&dir.join("part-0"), b"hello").unwrap();
        storage.write_all(&dir.join("_master.grid"), b"idx").unwrap();
        storage.write_all(&dir.join("nested/inner"), b"x").unwrap();

        assert_eq!(&storage.read_all(&dir.join("part-0")).unwrap()[..], b"hello");
        assert!(storage.exists(&dir.join("part-0")).unwrap());
        assert!(storage.status(dir).unwrap().is_dir);
        assert_eq!(storage.status(&dir.join("part-0")).unwrap().len, 5);

        let names: Vec<String> = storage
            .list(dir)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["_master.grid", "nested", "part-0"]);

        storage
            .rename(&dir.join("part-0"), &dir.join("part-1"))
            .unwrap();
        assert!(!storage.exists(&dir.join("part-0")).unwrap());
        assert!(storage.delete(&dir.join("part-1")).unwrap());
        assert!(!storage.delete(&dir.join("part-1")).unwrap());

        let err = storage.open(&dir.join("missing")).err().unwrap();
        assert!(matches!(err, GridError::NotFound(_)));
        assert!(matches!(
            storage.list(Path::new("nowhere")),
            Err(GridError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_storage() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn test_local_storage() {
        let temp = TempDir::new().unwrap();
        exercise(&LocalStorage::new(temp.path()));
    }

    #[test]
    fn test_memory_writer_publishes_on_drop() {
        let storage = MemoryStorage::new();
        {
            let mut writer = storage.create(Path::new("blob")).unwrap();
            writer.write_all(b"abc").unwrap();
        }
        assert_eq!(&storage.read_all(Path::new("blob")).unwrap()[..], b"abc");
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_visibility() {
        assert!(is_visible("part-00001"));
        assert!(!is_visible("_master.grid"));
        assert!(!is_visible(".crc"));
    }
}
