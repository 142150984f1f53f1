//! Staging error types.

use thiserror::Error;

use crate::mlang::MlangError;
use crate::storage::{InvalidNameError, StorageError};

/// Result type for staging operations.
pub type StageResult<T> = Result<T, StageError>;

/// Errors that can occur while staging, rebasing or committing.
#[derive(Debug, Error)]
pub enum StageError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot or revision error.
    #[error("{0}")]
    Mlang(#[from] MlangError),

    /// A persistent stage was given an unusable owner or stage id.
    #[error("persistent stage identification failed: invalid {field}: {source}")]
    Identity {
        field: &'static str,
        source: InvalidNameError,
    },

    /// A stored stage could not be decoded.
    #[error("stage codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors decoding a stored stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("not a stored stage (bad magic)")]
    BadMagic,

    #[error("unsupported stage format version {0}")]
    UnsupportedFormat(u16),

    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("truncated data: needed {needed} bytes at offset {offset}")]
    Truncated { needed: usize, offset: usize },

    #[error("invalid utf-8 at offset {0}")]
    InvalidUtf8(usize),

    #[error("invalid flag value {value} at offset {offset}")]
    InvalidFlag { value: u8, offset: usize },

    #[error("unknown version code {0}")]
    UnknownVersion(u32),

    #[error("{extra} unexpected bytes after the last record")]
    TrailingBytes { extra: usize },
}
