//! The append-only repository log.
//!
//! Every committed change to a string is one immutable row. Rows are never
//! updated or removed; the "current" text of a string is derived by picking
//! the newest row for its key. Implementations only have to provide
//! appending and filtered reads.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::errors::StorageResult;
use crate::storage::types::Timestamp;

/// The data of a single log row, as supplied by the committer.
///
/// Stored as one JSON object per row:
/// ```text
/// {"id":7,"branch":2000,"lang":"cs","component":"moodle","stringid":"add",
///  "text":"Přidat","timemodified":1285840000,"deleted":false,"commitmsg":"..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// version code of the branch
    pub branch: u32,
    pub lang: String,
    pub component: String,
    pub stringid: String,
    pub text: Option<String>,
    pub timemodified: Timestamp,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub commitmsg: String,
    /// free-form commit metadata (author, source, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

/// A row as persisted in the log, with its insertion-order id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    /// monotonically increasing insertion order, starting at 1
    pub id: u64,
    #[serde(flatten)]
    pub record: LogRecord,
}

/// Row selection criteria. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub branch: Option<u32>,
    pub lang: Option<String>,
    pub component: Option<String>,
    pub string_ids: Option<BTreeSet<String>>,
    /// only rows with `timemodified <= max_timestamp`
    pub max_timestamp: Option<Timestamp>,
    pub include_deleted: bool,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, code: u32) -> Self {
        self.branch = Some(code);
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn string_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_timestamp(mut self, timestamp: Option<Timestamp>) -> Self {
        self.max_timestamp = timestamp;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    /// check a record against every set criterion
    pub fn matches(&self, record: &LogRecord) -> bool {
        if !self.include_deleted && record.deleted {
            return false;
        }
        if self.branch.is_some_and(|b| b != record.branch) {
            return false;
        }
        if self.lang.as_deref().is_some_and(|l| l != record.lang) {
            return false;
        }
        if self.component.as_deref().is_some_and(|c| c != record.component) {
            return false;
        }
        if let Some(ids) = &self.string_ids {
            if !ids.contains(&record.stringid) {
                return false;
            }
        }
        if self.max_timestamp.is_some_and(|t| record.timemodified > t) {
            return false;
        }
        true
    }
}

/// The append-only history of string revisions.
pub trait RepositoryLog: Send + Sync {
    /// Append a record, returning it with its assigned id.
    fn insert(&self, record: LogRecord) -> StorageResult<LogRow>;

    /// Rows matching the filter, ordered by stringid then insertion order.
    fn select(&self, filter: &LogFilter) -> StorageResult<Vec<LogRow>>;

    /// Number of rows ever appended.
    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Rows of one (branch, lang, component), optionally narrowed to some
    /// string ids and capped at a timestamp.
    fn query(
        &self,
        branch: u32,
        lang: &str,
        component: &str,
        string_ids: Option<&[String]>,
        max_timestamp: Option<Timestamp>,
        include_deleted: bool,
    ) -> StorageResult<Vec<LogRow>> {
        let mut filter = LogFilter::new()
            .branch(branch)
            .lang(lang)
            .component(component)
            .max_timestamp(max_timestamp)
            .include_deleted(include_deleted);
        if let Some(ids) = string_ids {
            filter = filter.string_ids(ids.iter().cloned());
        }
        self.select(&filter)
    }
}

/// Shared handle to a log implementation.
pub type SharedLog = Arc<dyn RepositoryLog>;

/// An in-memory log.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone, Default)]
pub struct MemoryLog {
    rows: Arc<RwLock<Vec<LogRow>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from rows that already carry ids (used when loading a file).
    pub(crate) fn from_rows(rows: Vec<LogRow>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// id the next appended row will get
    pub(crate) fn next_id(&self) -> u64 {
        self.rows.read().last().map(|r| r.id + 1).unwrap_or(1)
    }

    /// Append a row whose id was assigned by the caller.
    pub(crate) fn push(&self, row: LogRow) {
        self.rows.write().push(row);
    }

    /// Snapshot of all rows in insertion order.
    pub fn rows(&self) -> Vec<LogRow> {
        self.rows.read().clone()
    }
}

impl RepositoryLog for MemoryLog {
    fn insert(&self, record: LogRecord) -> StorageResult<LogRow> {
        let mut rows = self.rows.write();
        let id = rows.last().map(|r| r.id + 1).unwrap_or(1);
        let row = LogRow { id, record };
        rows.push(row.clone());
        Ok(row)
    }

    fn select(&self, filter: &LogFilter) -> StorageResult<Vec<LogRow>> {
        let mut found: Vec<LogRow> = self
            .rows
            .read()
            .iter()
            .filter(|row| filter.matches(&row.record))
            .cloned()
            .collect();
        // rows are kept in id order, so a stable sort keeps insertion order per string
        found.sort_by(|a, b| a.record.stringid.cmp(&b.record.stringid));
        Ok(found)
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.rows.read().len())
    }
}

impl std::fmt::Debug for MemoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLog")
            .field("rows", &self.rows.read().len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// shorthand for building records in tests across the crate
    pub(crate) fn record(
        branch: u32,
        lang: &str,
        component: &str,
        stringid: &str,
        text: &str,
        timemodified: Timestamp,
    ) -> LogRecord {
        LogRecord {
            branch,
            lang: lang.to_string(),
            component: component.to_string(),
            stringid: stringid.to_string(),
            text: Some(text.to_string()),
            timemodified,
            deleted: false,
            commitmsg: String::new(),
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let log = MemoryLog::new();
        let a = log.insert(record(2000, "en", "moodle", "add", "Add", 10)).unwrap();
        let b = log.insert(record(2000, "en", "moodle", "edit", "Edit", 10)).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(log.len().unwrap(), 2);
        assert_eq!(log.next_id(), 3);
    }

    #[test]
    fn test_select_orders_by_stringid_then_id() {
        let log = MemoryLog::new();
        log.insert(record(2000, "en", "moodle", "zzz", "Z", 10)).unwrap();
        log.insert(record(2000, "en", "moodle", "aaa", "A1", 10)).unwrap();
        log.insert(record(2000, "en", "moodle", "aaa", "A2", 20)).unwrap();

        let rows = log.select(&LogFilter::new()).unwrap();
        let order: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_query_filters() {
        let log = MemoryLog::new();
        log.insert(record(2000, "en", "moodle", "add", "Add", 10)).unwrap();
        log.insert(record(2000, "cs", "moodle", "add", "Přidat", 10)).unwrap();
        log.insert(record(1900, "en", "moodle", "add", "Add", 10)).unwrap();
        log.insert(record(2000, "en", "moodle", "add", "Add new", 30)).unwrap();
        let mut deleted = record(2000, "en", "moodle", "edit", "Edit", 40);
        deleted.deleted = true;
        log.insert(deleted).unwrap();

        let rows = log.query(2000, "en", "moodle", None, None, false).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = log.query(2000, "en", "moodle", None, Some(20), false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.text.as_deref(), Some("Add"));

        let rows = log.query(2000, "en", "moodle", None, None, true).unwrap();
        assert_eq!(rows.len(), 3);

        let ids = vec!["edit".to_string()];
        let rows = log.query(2000, "en", "moodle", Some(&ids), None, true).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].record.deleted);
    }

    #[test]
    fn test_row_json_shape() {
        let row = LogRow {
            id: 7,
            record: record(2000, "en", "moodle", "add", "Add", 10),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["stringid"], "add");
        assert!(value.get("meta").is_none());

        let back: LogRow = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }
}
