//! High-level repository API.
//!
//! This module provides the user-facing handle tying the log, the stage
//! store, the query facade and the script engine together.

mod api;

pub use api::{Amos, AmosConfig, AmosError, AmosResult, StageStoreKind};
