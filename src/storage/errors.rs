//! Storage layer error types
//!
//! All errors that can occur while reading or appending the repository log,
//! or while storing stage blobs, are defined here.

use std::path::PathBuf;

use thiserror::Error;

/// failures of the log and of the stage blob stores
#[derive(Debug, Error)]
pub enum StorageError {
    /// the git-backed stage store failed
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// a log row could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// a stage branch exists but does not point at a commit
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// the log file or a stored stage failed validation
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// a stage commit holds something other than a blob
    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
