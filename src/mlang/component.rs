//! Components: the strings of one (name, language, version).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::mlang::errors::{MlangError, MlangResult};
use crate::mlang::revision::StringRevision;
use crate::mlang::version::Version;
use crate::storage::{RepositoryLog, Timestamp};

/// Identifier of a component for display and deduplication.
///
/// Hex MD5 of `name#lang@code`.
pub fn calculate_identifier(name: &str, lang: &str, version: &Version) -> String {
    let digest = md5::compute(format!("{}#{}@{}", name, lang, version.code));
    format!("{:x}", digest)
}

/// The (name, lang, version) triple identifying a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub name: String,
    pub lang: String,
    pub version: &'static Version,
}

impl ComponentKey {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, version: &'static Version) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            version,
        }
    }

    pub fn identifier(&self) -> String {
        calculate_identifier(&self.name, &self.lang, self.version)
    }
}

impl Ord for ComponentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.lang.cmp(&other.lang))
            .then_with(|| self.version.code.cmp(&other.version.code))
    }
}

impl PartialOrd for ComponentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.name, self.lang, self.version.code)
    }
}

/// How to read a component from the log.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    /// state as of this time, most recent when unset
    pub timestamp: Option<Timestamp>,
    /// keep strings whose latest revision is a removal
    pub include_deleted: bool,
    /// only these string ids; an empty list means no restriction
    pub string_ids: Option<Vec<String>>,
    /// attach commit details to every revision
    pub full_info: bool,
}

impl SnapshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, timestamp: Option<Timestamp>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn only<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn full_info(mut self, full: bool) -> Self {
        self.full_info = full;
        self
    }
}

/// A set of string revisions of one component, at most one per string id.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSnapshot {
    key: ComponentKey,
    strings: BTreeMap<String, StringRevision>,
}

impl ComponentSnapshot {
    /// Create an empty component.
    pub fn new(name: impl Into<String>, lang: impl Into<String>, version: &'static Version) -> Self {
        Self::from_key(ComponentKey::new(name, lang, version))
    }

    pub fn from_key(key: ComponentKey) -> Self {
        Self {
            key,
            strings: BTreeMap::new(),
        }
    }

    /// Read the state of a component from the log.
    ///
    /// For every string only rows at its newest time not after the requested
    /// one are candidates, the later inserted row winning ties. Unless
    /// deleted strings were asked for, removals are dropped from the
    /// candidates first, so a string is absent only when every candidate is
    /// a removal.
    pub fn from_snapshot(
        log: &dyn RepositoryLog,
        name: &str,
        lang: &str,
        version: &'static Version,
        options: &SnapshotOptions,
    ) -> MlangResult<Self> {
        let ids = options.string_ids.as_deref().filter(|ids| !ids.is_empty());
        let rows = log.query(version.code, lang, name, ids, options.timestamp, true)?;

        let mut newest: BTreeMap<&str, Timestamp> = BTreeMap::new();
        for row in &rows {
            let time = newest.entry(row.record.stringid.as_str()).or_insert(row.record.timemodified);
            *time = (*time).max(row.record.timemodified);
        }

        // rows of a string come in id order, so the last candidate wins
        let mut winners: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, row) in rows.iter().enumerate() {
            let id = row.record.stringid.as_str();
            if newest.get(id) != Some(&row.record.timemodified) {
                continue;
            }
            if row.record.deleted && !options.include_deleted {
                continue;
            }
            winners.insert(id, i);
        }

        let mut component = Self::new(name, lang, version);
        for i in winners.into_values() {
            component.put_string(StringRevision::from_row(&rows[i], options.full_info));
        }

        Ok(component)
    }

    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn lang(&self) -> &str {
        &self.key.lang
    }

    pub fn version(&self) -> &'static Version {
        self.key.version
    }

    pub fn identifier(&self) -> String {
        self.key.identifier()
    }

    /// Add a revision; an existing one with the same id is replaced only when
    /// `force` is set.
    pub fn add_string(&mut self, revision: StringRevision, force: bool) -> MlangResult<()> {
        if !force && self.strings.contains_key(&revision.id) {
            return Err(MlangError::DuplicateKey {
                component: self.key.to_string(),
                id: revision.id,
            });
        }
        self.put_string(revision);
        Ok(())
    }

    /// Insert a revision, replacing any previous one with the same id.
    pub(crate) fn put_string(&mut self, revision: StringRevision) -> Option<StringRevision> {
        self.strings.insert(revision.id.clone(), revision)
    }

    /// Remove a string, handing back its revision.
    pub fn unlink_string(&mut self, id: &str) -> Option<StringRevision> {
        self.strings.remove(id)
    }

    pub fn get_string(&self, id: &str) -> Option<&StringRevision> {
        self.strings.get(id)
    }

    pub fn has_string(&self, id: &str) -> bool {
        self.strings.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// String ids in order.
    pub fn string_keys(&self) -> impl Iterator<Item = &str> {
        self.strings.keys().map(String::as_str)
    }

    /// Revisions ordered by string id.
    pub fn iter(&self) -> impl Iterator<Item = &StringRevision> {
        self.strings.values()
    }

    pub fn clear(&mut self) {
        self.strings.clear();
    }

    /// Keep only strings that `mask` also has, returning how many were
    /// removed. A string present in `mask` as a removal still counts.
    pub fn intersect(&mut self, mask: &ComponentSnapshot) -> usize {
        let before = self.strings.len();
        self.strings.retain(|id, _| mask.has_string(id));
        before - self.strings.len()
    }

    /// Keep the revisions for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&StringRevision) -> bool) {
        self.strings.retain(|_, revision| keep(revision));
    }
}

impl<'a> IntoIterator for &'a ComponentSnapshot {
    type Item = &'a StringRevision;
    type IntoIter = std::collections::btree_map::Values<'a, String, StringRevision>;

    fn into_iter(self) -> Self::IntoIter {
        self.strings.values()
    }
}
