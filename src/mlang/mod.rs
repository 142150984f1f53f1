//! The language model: versions, string revisions and components.
//!
//! ```text
//!   VersionRegistry ──► &'static Version
//!                              │
//!   ComponentSnapshot (name, lang, version)
//!      └── stringid ──► StringRevision { text, timemodified, deleted }
//! ```
//!
//! A component is read from the repository log with
//! [`ComponentSnapshot::from_snapshot`] or loaded from a strings file with
//! [`ComponentSnapshot::from_phpfile`]; both hand out owned values that can
//! be edited freely and then staged.

mod component;
mod errors;
mod phpfile;
mod revision;
mod syntax;
mod version;

pub use component::{calculate_identifier, ComponentKey, ComponentSnapshot, SnapshotOptions};
pub use errors::{MlangError, MlangResult};
pub use phpfile::{is_valid_string_id, name_from_filename, parse_strings};
pub use revision::{RevisionExtra, StringRevision};
pub use syntax::{fix_syntax, fix_syntax_codes, SyntaxFormat};
pub(crate) use syntax::trim_blank;
pub use version::{Version, VersionRegistry};
