//! storage layer for AMOS
//!
//! this module owns everything that touches disk: the append-only repository
//! log and the blob stores backing persistent stages. The upper layers
//! (snapshots, stages, scripts, queries) use this API and never touch files
//! or git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        RepositoryLog         │   │          BlobStore           │
//! │  (append-only string rows)   │   │  (opaque stage payloads)     │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!        │               │              │            │           │
//!        ▼               ▼              ▼            ▼           ▼
//!  ┌───────────┐   ┌───────────┐  ┌──────────┐ ┌──────────┐ ┌──────────┐
//!  │ MemoryLog │   │  FileLog  │  │  Memory  │ │   Dir    │ │   Git    │
//!  │           │   │  (.jsonl) │  │          │ │ <o>/<s>  │ │ stages/* │
//!  └───────────┘   └───────────┘  └──────────┘ └──────────┘ └──────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use amos::storage::{FileLog, RepositoryLog};
//!
//! let log = FileLog::open("./amos/log.jsonl")?;
//! let rows = log.query(2000, "cs", "moodle", None, None, false)?;
//! ```

mod blob;
mod errors;
mod file_log;
mod git;
mod log;
mod types;

// Re-export public API
pub use blob::{BlobStore, DirBlobStore, MemoryBlobStore, SharedBlobStore};
pub use errors::{StorageError, StorageResult};
pub use file_log::FileLog;
pub use git::{GitBlobStore, StageCommit};
pub use log::{LogFilter, LogRecord, LogRow, MemoryLog, RepositoryLog, SharedLog};
pub use types::{now, GitSignature, InvalidNameError, OwnerId, StageBranch, StageId, Timestamp};

#[cfg(test)]
pub(crate) use log::tests::record;
