//! Staging of edits before they are committed into the log.
//!
//! ```text
//!   ComponentSnapshot ──add──► StagingArea ──rebase──► StagingArea ──commit──► RepositoryLog
//!                                   ▲
//!                                   │ Deref
//!                        PersistentStagingArea ◄──codec──► BlobStore
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use amos::stage::StagingArea;
//!
//! let mut stage = StagingArea::new(log.clone());
//! stage.add(&component, false)?;
//! let rows = stage.commit("Fixed typos", None, false)?;
//! ```

mod area;
pub mod codec;
mod errors;
mod persistent;

pub use area::StagingArea;
pub use errors::{CodecError, StageError, StageResult};
pub use persistent::PersistentStagingArea;
