//! Error types for the language model layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for snapshot and revision operations.
pub type MlangResult<T> = Result<T, MlangError>;

/// Errors raised while building or editing component snapshots.
#[derive(Debug, Error)]
pub enum MlangError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The string is already present and replacing it was not requested.
    #[error("string '{id}' already exists in {component}")]
    DuplicateKey { component: String, id: String },

    /// The placeholder syntax cannot be converted in this direction.
    #[error("unsupported syntax conversion from format {from} to format {to}")]
    UnsupportedConversion { from: u8, to: u8 },

    /// A strings definition file could not be read.
    #[error("strings definition file {} not readable: {reason}", path.display())]
    MissingResource { path: PathBuf, reason: String },

    /// No version matches the given code, label or branch.
    #[error("unknown version: {0}")]
    UnknownVersion(String),
}
