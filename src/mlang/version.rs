//! The fixed table of known versions (branches).
//!
//! Versions are handed out as `&'static` references into a single table, so
//! every snapshot of the same branch shares the same instance and nobody can
//! mutate it.

use std::fmt;

use crate::mlang::errors::{MlangError, MlangResult};
use crate::mlang::syntax::SyntaxFormat;

/// One known version of the string set.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Version {
    /// internal code stored in the log
    pub code: u32,
    /// human-readable label, like "2.0"
    pub label: &'static str,
    /// name of the corresponding source branch
    pub branch: &'static str,
    /// whether translations are accepted on this branch
    pub translatable: bool,
    /// whether translators should focus on this branch
    pub current: bool,
}

impl Version {
    pub const MOODLE_16: u32 = 1600;
    pub const MOODLE_17: u32 = 1700;
    pub const MOODLE_18: u32 = 1800;
    pub const MOODLE_19: u32 = 1900;
    pub const MOODLE_20: u32 = 2000;
    pub const MOODLE_21: u32 = 2100;

    /// Placeholder syntax used by strings of this version.
    pub fn syntax_format(&self) -> SyntaxFormat {
        if self.code <= Self::MOODLE_19 {
            SyntaxFormat::Legacy
        } else {
            SyntaxFormat::Modern
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// newest first
static VERSIONS: [Version; 6] = [
    Version {
        code: Version::MOODLE_21,
        label: "2.1",
        branch: "MOODLE_21_STABLE",
        translatable: false,
        current: false,
    },
    Version {
        code: Version::MOODLE_20,
        label: "2.0",
        branch: "MOODLE_20_STABLE",
        translatable: true,
        current: true,
    },
    Version {
        code: Version::MOODLE_19,
        label: "1.9",
        branch: "MOODLE_19_STABLE",
        translatable: true,
        current: false,
    },
    Version {
        code: Version::MOODLE_18,
        label: "1.8",
        branch: "MOODLE_18_STABLE",
        translatable: true,
        current: false,
    },
    Version {
        code: Version::MOODLE_17,
        label: "1.7",
        branch: "MOODLE_17_STABLE",
        translatable: true,
        current: false,
    },
    Version {
        code: Version::MOODLE_16,
        label: "1.6",
        branch: "MOODLE_16_STABLE",
        translatable: true,
        current: false,
    },
];

/// Lookup functions over the version table.
pub struct VersionRegistry;

impl VersionRegistry {
    /// All known versions, newest first.
    pub fn all() -> &'static [Version] {
        &VERSIONS
    }

    pub fn by_code(code: u32) -> Option<&'static Version> {
        VERSIONS.iter().find(|v| v.code == code)
    }

    /// Find a version by its branch name, like `MOODLE_20_STABLE`.
    pub fn by_branch(branch: &str) -> Option<&'static Version> {
        VERSIONS.iter().find(|v| v.branch == branch)
    }

    /// Find a version by its label, like `2.0`.
    pub fn by_label(label: &str) -> Option<&'static Version> {
        VERSIONS.iter().find(|v| v.label == label)
    }

    /// Versions accepting translations, newest first.
    pub fn list_translatable() -> Vec<&'static Version> {
        VERSIONS.iter().filter(|v| v.translatable).collect()
    }

    /// The version translators should focus on.
    pub fn current() -> Option<&'static Version> {
        VERSIONS.iter().find(|v| v.current)
    }

    /// Resolve a user-supplied version given as a code, label or branch name.
    pub fn resolve(spec: &str) -> MlangResult<&'static Version> {
        let spec = spec.trim();
        spec.parse::<u32>()
            .ok()
            .and_then(Self::by_code)
            .or_else(|| Self::by_label(spec))
            .or_else(|| Self::by_branch(spec))
            .ok_or_else(|| MlangError::UnknownVersion(spec.to_string()))
    }
}
