//! Error types for spatio-grid.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`GridError`].
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors raised while encoding, indexing or writing partitioned data.
///
/// A dataset without a master index is not an error; lookups return
/// `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialized record, shape or signature is malformed.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// A binary record ended before all of its fields were read.
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("found {count} master files in {}", dir.display())]
    MultipleMasterFiles { dir: PathBuf, count: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// `write` was called on a writer that is closing or closed.
    #[error("writer is closed")]
    WriterClosed,

    /// The index was queried before `bulk_load`.
    #[error("global index has not been loaded")]
    IndexNotLoaded,

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl GridError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        GridError::InvalidFormat(msg.into())
    }

    /// Corrupted or unparsable data.
    pub fn is_format_error(&self) -> bool {
        matches!(self, GridError::InvalidFormat(_) | GridError::UnexpectedEof)
    }

    /// Misconfigured dataset or job.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            GridError::MultipleMasterFiles { .. } | GridError::InvalidConfig(_)
        )
    }

    /// Programming-contract violation by the caller.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, GridError::WriterClosed | GridError::IndexNotLoaded)
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}
