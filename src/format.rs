//! Block formats: compression by file name and the local-index signature.
//!
//! A block built with a local tree index starts with an 8-byte marker
//! ([`SIGNATURE`]). Blocks may be compressed; the codec is chosen from the
//! file extension, the same way on the write and the read side.

use crate::codec::{AnyShape, Codec, ShapeKind};
use crate::dataset;
use crate::error::{GridError, Result};
use crate::storage::Storage;
use bytes::Buf;
use flate2::Compression as Level;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use serde::{Deserialize, Serialize};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// The marker value, stored big-endian.
pub const LOCAL_INDEX_MARKER: i64 = -0x0001_2345_6789_10;

pub const SIGNATURE_LEN: usize = 8;

/// First bytes of every locally indexed block.
pub const SIGNATURE: [u8; SIGNATURE_LEN] = LOCAL_INDEX_MARKER.to_be_bytes();

/// Block compression codecs, recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// `.gz`
    Gzip,
    /// `.deflate`, zlib framing
    Deflate,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => "gz",
            Compression::Deflate => "deflate",
        }
    }

    /// Codec associated with a file name, if any.
    pub fn for_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Some(Compression::Gzip),
            Some("deflate") => Some(Compression::Deflate),
            _ => None,
        }
    }

    pub fn decoder(&self, inner: Box<dyn Read + Send>) -> Box<dyn Read + Send> {
        match self {
            Compression::Gzip => Box::new(GzDecoder::new(inner)),
            Compression::Deflate => Box::new(ZlibDecoder::new(inner)),
        }
    }
}

/// Open a block, decompressing transparently when its name carries a codec
/// extension.
pub fn open_block(storage: &dyn Storage, path: &Path) -> Result<Box<dyn Read + Send>> {
    let raw = storage.open(path)?;
    Ok(match Compression::for_path(path) {
        Some(codec) => codec.decoder(raw),
        None => raw,
    })
}

/// Output stream of one block.
pub enum BlockSink {
    Plain(BufWriter<Box<dyn Write + Send>>),
    Gzip(GzEncoder<BufWriter<Box<dyn Write + Send>>>),
    Deflate(ZlibEncoder<BufWriter<Box<dyn Write + Send>>>),
}

impl BlockSink {
    pub fn new(inner: Box<dyn Write + Send>, compression: Option<Compression>) -> Self {
        let inner = BufWriter::new(inner);
        match compression {
            None => BlockSink::Plain(inner),
            Some(Compression::Gzip) => BlockSink::Gzip(GzEncoder::new(inner, Level::default())),
            Some(Compression::Deflate) => {
                BlockSink::Deflate(ZlibEncoder::new(inner, Level::default()))
            }
        }
    }

    /// Write any codec trailer and flush everything to the backend.
    pub fn finish(&mut self) -> io::Result<()> {
        match self {
            BlockSink::Plain(w) => w.flush(),
            BlockSink::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
            BlockSink::Deflate(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

impl Write for BlockSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BlockSink::Plain(w) => w.write(buf),
            BlockSink::Gzip(w) => w.write(buf),
            BlockSink::Deflate(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BlockSink::Plain(w) => w.flush(),
            BlockSink::Gzip(w) => w.flush(),
            BlockSink::Deflate(w) => w.flush(),
        }
    }
}

/// Decode every record of a flat block, in the order they were written.
pub fn read_block<S: Codec>(storage: &dyn Storage, path: &Path) -> Result<Vec<S>> {
    decode_block(storage, path, |buf| S::read_binary(buf))
}

/// Like [`read_block`] for a record type only known at run time.
pub fn read_block_as(
    storage: &dyn Storage,
    path: &Path,
    kind: ShapeKind,
) -> Result<Vec<AnyShape>> {
    decode_block(storage, path, |buf| kind.read_binary(buf))
}

fn decode_block<T>(
    storage: &dyn Storage,
    path: &Path,
    mut decode: impl FnMut(&mut &[u8]) -> Result<T>,
) -> Result<Vec<T>> {
    let mut raw = Vec::new();
    open_block(storage, path)?.read_to_end(&mut raw)?;
    let mut buf = raw.as_slice();
    let mut records = Vec::new();
    while buf.has_remaining() {
        records.push(decode(&mut buf)?);
    }
    Ok(records)
}

/// Emit the local-index marker at the current position of `writer`.
pub fn write_signature(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(&SIGNATURE)
}

/// Whether the stream starts with the local-index marker. Streams shorter
/// than the marker are flat.
pub fn starts_with_signature(reader: &mut impl Read) -> io::Result<bool> {
    let mut head = [0u8; SIGNATURE_LEN];
    match reader.read_exact(&mut head) {
        Ok(()) => Ok(head == SIGNATURE),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` holds locally indexed data.
///
/// For a directory the first partition listed in its master index is
/// checked; a directory without a master index is flat. Failures are logged
/// and reported as `false`.
pub fn is_locally_indexed(storage: &dyn Storage, path: &Path) -> bool {
    match check_local_index(storage, path) {
        Ok(indexed) => indexed,
        Err(e) => {
            log::warn!(
                "could not check local index signature of '{}': {e}",
                path.display()
            );
            false
        }
    }
}

fn check_local_index(storage: &dyn Storage, path: &Path) -> Result<bool> {
    let status = storage.status(path)?;
    let block = if status.is_dir {
        let Some(index) = dataset::global_index(storage, path)? else {
            return Ok(false);
        };
        match index.first() {
            Some(first) => path.join(&first.filename),
            None => return Ok(false),
        }
    } else {
        path.to_path_buf()
    };

    // The decoder, and the stream it wraps, are dropped on both outcomes.
    let mut reader = open_block(storage, &block)?;
    starts_with_signature(&mut reader).map_err(GridError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::path::PathBuf;

    fn write_block(storage: &MemoryStorage, name: &str, payload: &[u8]) -> PathBuf {
        let path = PathBuf::from(name);
        let mut sink = BlockSink::new(
            storage.create(&path).unwrap(),
            Compression::for_path(&path),
        );
        sink.write_all(payload).unwrap();
        sink.finish().unwrap();
        drop(sink);
        path
    }

    #[test]
    fn test_signature_bytes() {
        assert_eq!(SIGNATURE, [0xFF, 0xFF, 0xFE, 0xDC, 0xBA, 0x98, 0x76, 0xF0]);
    }

    #[test]
    fn test_detects_signature_plain_and_compressed() {
        let storage = MemoryStorage::new();
        let mut payload = SIGNATURE.to_vec();
        payload.extend_from_slice(b"tree body");

        for name in ["block", "block.gz", "block.deflate"] {
            let path = write_block(&storage, name, &payload);
            assert!(is_locally_indexed(&storage, &path), "{name}");
        }
    }

    #[test]
    fn test_zero_prefix_is_flat() {
        let storage = MemoryStorage::new();
        for name in ["zeros", "zeros.gz"] {
            let path = write_block(&storage, name, &[0u8; 64]);
            assert!(!is_locally_indexed(&storage, &path));
        }
    }

    #[test]
    fn test_short_and_missing_blocks_are_flat() {
        let storage = MemoryStorage::new();
        let path = write_block(&storage, "tiny", &SIGNATURE[..4]);
        assert!(!is_locally_indexed(&storage, &path));
        assert!(!is_locally_indexed(&storage, Path::new("absent")));
    }

    #[test]
    fn test_corrupt_gzip_degrades_to_false() {
        let storage = MemoryStorage::new();
        storage
            .write_all(Path::new("broken.gz"), b"definitely not gzip data")
            .unwrap();
        assert!(!is_locally_indexed(&storage, Path::new("broken.gz")));
    }

    #[test]
    fn test_write_signature() {
        let mut out = Vec::new();
        write_signature(&mut out).unwrap();
        let mut reader = out.as_slice();
        assert!(starts_with_signature(&mut reader).unwrap());
    }

    #[test]
    fn test_compression_for_path() {
        assert_eq!(
            Compression::for_path(Path::new("a/part-0_00001.gz")),
            Some(Compression::Gzip)
        );
        assert_eq!(
            Compression::for_path(Path::new("x.deflate")),
            Some(Compression::Deflate)
        );
        assert_eq!(Compression::for_path(Path::new("part-0_00001")), None);
    }
}
