//! AMOS - a versioned repository of localized strings
//!
//! Every string of every component, language and branch is kept as an
//! append-only log of revisions. Edits are collected in a staging area,
//! rebased against the log to drop stale or no-op revisions, and committed
//! back as new rows. A small script language (`CPY`, `MOV`, `HLP`, `REM`)
//! embedded in commit messages performs bulk edits across all languages.
//!
//! # Example
//!
//! ```no_run
//! use amos::db::Amos;
//! use amos::mlang::{ComponentSnapshot, StringRevision, VersionRegistry};
//!
//! let amos = Amos::open("./amos").unwrap();
//! let version = VersionRegistry::by_code(2000).unwrap();
//!
//! let mut component = ComponentSnapshot::new("moodle", "en", version);
//! component.add_string(StringRevision::new("add", "Add", None), false).unwrap();
//!
//! let mut stage = amos.stage();
//! stage.add(&component, false).unwrap();
//! amos.commit(&mut stage, "Initial import", false).unwrap();
//! ```

pub mod db;
pub mod mlang;
pub mod query;
pub mod script;
pub mod stage;
pub mod storage;
