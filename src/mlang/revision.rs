//! A single string at one point of its history.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::mlang::syntax::trim_blank;
use crate::storage::{now, LogRow, Timestamp};

/// Commit details attached to revisions loaded with full info.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionExtra {
    /// id of the log row the revision was read from
    pub row_id: u64,
    pub commitmsg: String,
    pub meta: BTreeMap<String, Value>,
}

/// The text of one string identifier at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct StringRevision {
    pub id: String,
    pub text: Option<String>,
    pub timemodified: Timestamp,
    pub deleted: bool,
    pub extra: Option<RevisionExtra>,
}

impl StringRevision {
    /// Create a live revision; `timemodified` defaults to now.
    pub fn new(id: impl Into<String>, text: impl Into<String>, timemodified: Option<Timestamp>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            timemodified: timemodified.unwrap_or_else(now),
            deleted: false,
            extra: None,
        }
    }

    /// Create a removal record, optionally keeping the last known text.
    pub fn removal(id: impl Into<String>, text: Option<String>, timemodified: Option<Timestamp>) -> Self {
        Self {
            id: id.into(),
            text,
            timemodified: timemodified.unwrap_or_else(now),
            deleted: true,
            extra: None,
        }
    }

    /// Build a revision from a log row.
    pub(crate) fn from_row(row: &LogRow, full_info: bool) -> Self {
        let record = &row.record;
        let extra = full_info.then(|| RevisionExtra {
            row_id: row.id,
            commitmsg: record.commitmsg.clone(),
            meta: record.meta.clone(),
        });

        Self {
            id: record.stringid.clone(),
            text: record.text.clone(),
            timemodified: record.timemodified,
            deleted: record.deleted,
            extra,
        }
    }

    /// Whether two revisions should be considered different.
    ///
    /// Two deleted revisions are always equal. Otherwise texts are compared
    /// with surrounding blanks ignored; a missing text only equals another
    /// missing text. Timestamps play no role.
    pub fn differ(a: &StringRevision, b: &StringRevision) -> bool {
        if a.deleted && b.deleted {
            return false;
        }
        match (a.text.as_deref(), b.text.as_deref()) {
            (None, None) => false,
            (Some(x), Some(y)) => trim_blank(x) != trim_blank(y),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record;

    #[test]
    fn test_differ_ignores_time_and_blanks() {
        let a = StringRevision::new("foo", "Hello", Some(100));
        let b = StringRevision::new("foo", "  Hello\n", Some(50));
        assert!(!StringRevision::differ(&a, &a));
        assert!(!StringRevision::differ(&a, &b));

        let c = StringRevision::new("foo", "Hello!", Some(100));
        assert!(StringRevision::differ(&a, &c));
    }

    #[test]
    fn test_deleted_pairs_are_equal() {
        let a = StringRevision::removal("foo", Some("One".into()), Some(1));
        let b = StringRevision::removal("foo", Some("Two".into()), Some(2));
        assert!(!StringRevision::differ(&a, &b));

        let live = StringRevision::new("foo", "One", Some(1));
        assert!(!StringRevision::differ(&a, &live));
        assert!(StringRevision::differ(&b, &live));
    }

    #[test]
    fn test_missing_text() {
        let none_a = StringRevision::removal("foo", None, Some(1));
        let mut none_b = StringRevision::new("foo", "", Some(1));
        none_b.text = None;
        let empty = StringRevision::new("foo", "", Some(1));

        assert!(!StringRevision::differ(&none_b, &none_b.clone()));
        assert!(StringRevision::differ(&none_b, &empty));
        assert!(StringRevision::differ(&none_a, &empty));
    }

    #[test]
    fn test_from_row_full_info() {
        let mut rec = record(2000, "cs", "moodle", "add", "Přidat", 10);
        rec.commitmsg = "Initial".into();
        let row = LogRow { id: 5, record: rec };

        let plain = StringRevision::from_row(&row, false);
        assert_eq!(plain.id, "add");
        assert_eq!(plain.text.as_deref(), Some("Přidat"));
        assert!(plain.extra.is_none());

        let full = StringRevision::from_row(&row, true);
        let extra = full.extra.unwrap();
        assert_eq!(extra.row_id, 5);
        assert_eq!(extra.commitmsg, "Initial");
    }
}
