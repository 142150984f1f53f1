//! The staging area: edits waiting to be committed into the log.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::mlang::{
    trim_blank, ComponentKey, ComponentSnapshot, SnapshotOptions, StringRevision, Version,
};
use crate::stage::errors::StageResult;
use crate::storage::{now, LogRecord, SharedLog, Timestamp};

/// A set of staged components, keyed by (name, lang, version).
///
/// Staged revisions are invisible to readers of the log until
/// [`commit`](StagingArea::commit) appends them.
pub struct StagingArea {
    log: SharedLog,
    components: BTreeMap<ComponentKey, ComponentSnapshot>,
}

impl StagingArea {
    /// Create an empty stage over a log.
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            components: BTreeMap::new(),
        }
    }

    /// The log this stage rebases against and commits into.
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Stage copies of every revision of `component`.
    ///
    /// Revisions are merged into the staged component with the same key;
    /// staging an id that is already staged fails unless `force` is set.
    pub fn add(&mut self, component: &ComponentSnapshot, force: bool) -> StageResult<()> {
        let staged = self
            .components
            .entry(component.key().clone())
            .or_insert_with(|| ComponentSnapshot::from_key(component.key().clone()));
        for revision in component.iter() {
            staged.add_string(revision.clone(), force)?;
        }
        Ok(())
    }

    /// Stage everything staged in `other`.
    pub fn absorb(&mut self, other: StagingArea, force: bool) -> StageResult<()> {
        for component in other.components.values() {
            self.add(component, force)?;
        }
        Ok(())
    }

    /// Drop every staged component.
    pub fn clear(&mut self) {
        self.components.clear();
    }

    /// Keep only staged revisions that would change the log.
    ///
    /// Every staged component is compared with its state as of
    /// `base_timestamp` (most recent when unset), removals included. With
    /// `delete_missing`, strings present in the log but not staged get a
    /// staged removal timestamped `delete_timestamp` (now when unset).
    /// Components left empty are unstaged.
    pub fn rebase(
        &mut self,
        base_timestamp: Option<Timestamp>,
        delete_missing: bool,
        delete_timestamp: Option<Timestamp>,
    ) -> StageResult<()> {
        let delete_timestamp = delete_missing.then(|| delete_timestamp.unwrap_or_else(now));
        let options = SnapshotOptions::new().at(base_timestamp).include_deleted(true);
        let keys: Vec<ComponentKey> = self.components.keys().cloned().collect();

        for key in keys {
            let cap = ComponentSnapshot::from_snapshot(
                self.log.as_ref(),
                &key.name,
                &key.lang,
                key.version,
                &options,
            )?;
            let Some(component) = self.components.get_mut(&key) else {
                continue;
            };

            if let Some(timestamp) = delete_timestamp {
                for existing in cap.iter() {
                    if !component.has_string(&existing.id) {
                        let mut removal = existing.clone();
                        removal.deleted = true;
                        removal.timemodified = timestamp;
                        component.add_string(removal, false)?;
                    }
                }
            }

            let staged = component.len();
            component.retain(|revision| survives_rebase(revision, cap.get_string(&revision.id)));
            tracing::debug!(
                component = %key,
                staged,
                kept = component.len(),
                "rebased component"
            );

            if component.is_empty() {
                self.components.remove(&key);
            }
        }

        Ok(())
    }

    /// Append every staged revision to the log and clear the stage.
    ///
    /// Unless `skip_rebase` is set the stage is rebased first. Returns the
    /// number of rows appended. A failure part way leaves the rows appended
    /// so far in the log and the stage untouched.
    pub fn commit(
        &mut self,
        message: &str,
        meta: Option<&BTreeMap<String, Value>>,
        skip_rebase: bool,
    ) -> StageResult<usize> {
        if !skip_rebase {
            self.rebase(None, false, None)?;
        }

        let message = trim_blank(message);
        let mut appended = 0;
        for component in self.components.values() {
            for revision in component.iter() {
                self.log.insert(LogRecord {
                    branch: component.version().code,
                    lang: component.lang().to_string(),
                    component: component.name().to_string(),
                    stringid: revision.id.clone(),
                    text: revision.text.clone(),
                    timemodified: revision.timemodified,
                    deleted: revision.deleted,
                    commitmsg: message.to_string(),
                    meta: meta.cloned().unwrap_or_default(),
                })?;
                appended += 1;
            }
        }

        tracing::info!(
            rows = appended,
            components = self.components.len(),
            commitmsg = message,
            "committed stage"
        );
        self.clear();
        Ok(appended)
    }

    pub fn get_component(
        &self,
        name: &str,
        lang: &str,
        version: &'static Version,
    ) -> Option<&ComponentSnapshot> {
        self.components.get(&ComponentKey::new(name, lang, version))
    }

    pub fn has_component(&self, name: &str, lang: &str, version: &'static Version) -> bool {
        self.components.contains_key(&ComponentKey::new(name, lang, version))
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of staged components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Total number of staged revisions.
    pub fn revision_count(&self) -> usize {
        self.components.values().map(ComponentSnapshot::len).sum()
    }

    /// Staged components ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentSnapshot> {
        self.components.values()
    }

    /// Replace the staged content with decoded components.
    pub(crate) fn replace_components(&mut self, components: Vec<ComponentSnapshot>) {
        self.components = components
            .into_iter()
            .map(|component| (component.key().clone(), component))
            .collect();
    }
}

/// Whether a staged revision still has to be committed, given the revision
/// the log holds for the same string.
fn survives_rebase(staged: &StringRevision, cap: Option<&StringRevision>) -> bool {
    let Some(cap) = cap else {
        // new string
        return true;
    };
    if staged.deleted && !cap.deleted {
        // explicit removal
        return true;
    }
    if !StringRevision::differ(staged, cap) {
        return false;
    }
    // older than the cap
    staged.timemodified >= cap.timemodified
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::mlang::VersionRegistry;
    use crate::storage::{record, MemoryLog, RepositoryLog};

    fn v20() -> &'static Version {
        VersionRegistry::by_code(2000).unwrap()
    }

    fn setup() -> (MemoryLog, StagingArea) {
        let log = MemoryLog::new();
        let stage = StagingArea::new(Arc::new(log.clone()));
        (log, stage)
    }

    fn component(strings: &[(&str, &str, Timestamp)]) -> ComponentSnapshot {
        let mut component = ComponentSnapshot::new("moodle", "en", v20());
        for (id, text, time) in strings {
            component
                .add_string(StringRevision::new(*id, *text, Some(*time)), false)
                .unwrap();
        }
        component
    }

    #[test]
    fn test_add_copies_and_merges() {
        let (_log, mut stage) = setup();
        let mut source = component(&[("foo", "Foo", 1)]);
        stage.add(&source, false).unwrap();
        source.clear();

        stage.add(&component(&[("bar", "Bar", 1)]), false).unwrap();
        let staged = stage.get_component("moodle", "en", v20()).unwrap();
        assert_eq!(staged.len(), 2);
        assert!(stage.has_component("moodle", "en", v20()));
        assert!(!stage.has_component("moodle", "cs", v20()));

        assert!(stage.add(&component(&[("foo", "Foo!", 2)]), false).is_err());
        stage.add(&component(&[("foo", "Foo!", 2)]), true).unwrap();
        let staged = stage.get_component("moodle", "en", v20()).unwrap();
        assert_eq!(staged.get_string("foo").unwrap().text.as_deref(), Some("Foo!"));
    }

    #[test]
    fn test_rebase_drops_unchanged_older() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Hello", 50)).unwrap();

        stage.add(&component(&[("foo", "Hello", 100)]), false).unwrap();
        stage.rebase(None, false, None).unwrap();
        assert!(stage.is_empty());
    }

    #[test]
    fn test_rebase_keeps_newer_change_and_commit_appends() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Old", 100)).unwrap();

        stage.add(&component(&[("foo", "New", 200)]), false).unwrap();
        let appended = stage.commit("  Fix typo \n", None, false).unwrap();

        assert_eq!(appended, 1);
        assert!(stage.is_empty());
        let rows = log.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].record.text.as_deref(), Some("New"));
        assert_eq!(rows[1].record.commitmsg, "Fix typo");
    }

    #[test]
    fn test_rebase_drops_stale_change() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Current", 100)).unwrap();

        stage.add(&component(&[("foo", "Stale", 50), ("bar", "Bar", 50)]), false).unwrap();
        stage.rebase(None, false, None).unwrap();

        let staged = stage.get_component("moodle", "en", v20()).unwrap();
        assert!(!staged.has_string("foo"));
        assert!(staged.has_string("bar"));
    }

    #[test]
    fn test_rebase_keeps_explicit_removal() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Foo", 100)).unwrap();

        let mut removal = ComponentSnapshot::new("moodle", "en", v20());
        removal
            .add_string(StringRevision::removal("foo", Some("Foo".into()), Some(10)), false)
            .unwrap();
        stage.add(&removal, false).unwrap();
        stage.rebase(None, false, None).unwrap();

        assert!(stage
            .get_component("moodle", "en", v20())
            .unwrap()
            .get_string("foo")
            .unwrap()
            .deleted);
    }

    #[test]
    fn test_rebase_removal_of_removed_string_collapses() {
        let (log, mut stage) = setup();
        let mut removed = record(2000, "en", "moodle", "foo", "Foo", 10);
        removed.deleted = true;
        log.insert(removed).unwrap();

        let mut removal = ComponentSnapshot::new("moodle", "en", v20());
        removal
            .add_string(StringRevision::removal("foo", Some("Other".into()), Some(500)), false)
            .unwrap();
        stage.add(&removal, false).unwrap();
        stage.rebase(None, false, None).unwrap();
        assert!(stage.is_empty());
    }

    #[test]
    fn test_rebase_delete_missing() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "keep", "Keep", 10)).unwrap();
        log.insert(record(2000, "en", "moodle", "drop", "Drop", 10)).unwrap();

        stage.add(&component(&[("keep", "Keep", 20)]), false).unwrap();
        stage.rebase(None, true, Some(99)).unwrap();

        let staged = stage.get_component("moodle", "en", v20()).unwrap();
        assert_eq!(staged.len(), 1);
        let removal = staged.get_string("drop").unwrap();
        assert!(removal.deleted);
        assert_eq!(removal.timemodified, 99);
        assert_eq!(removal.text.as_deref(), Some("Drop"));
    }

    #[test]
    fn test_rebase_against_past_state() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Old", 10)).unwrap();
        log.insert(record(2000, "en", "moodle", "foo", "New", 20)).unwrap();

        stage.add(&component(&[("foo", "Old", 30)]), false).unwrap();
        stage.rebase(Some(15), false, None).unwrap();
        assert!(stage.is_empty());
    }

    #[test]
    fn test_commit_skip_rebase_and_meta() {
        let (log, mut stage) = setup();
        log.insert(record(2000, "en", "moodle", "foo", "Same", 10)).unwrap();
        stage.add(&component(&[("foo", "Same", 20)]), false).unwrap();

        let mut meta = BTreeMap::new();
        meta.insert("userid".to_string(), Value::from(42));
        let appended = stage.commit("import", Some(&meta), true).unwrap();

        assert_eq!(appended, 1);
        assert_eq!(log.len().unwrap(), 2);
        assert_eq!(log.rows()[1].record.meta["userid"], Value::from(42));
    }

    #[test]
    fn test_absorb_and_counts() {
        let (log, mut stage) = setup();
        let mut other = StagingArea::new(Arc::new(log));
        other.add(&component(&[("a", "A", 1), ("b", "B", 1)]), false).unwrap();
        let mut cs = ComponentSnapshot::new("moodle", "cs", v20());
        cs.add_string(StringRevision::new("a", "Á", Some(1)), false).unwrap();
        other.add(&cs, false).unwrap();

        stage.absorb(other, false).unwrap();
        assert_eq!(stage.len(), 2);
        assert_eq!(stage.revision_count(), 3);
        let langs: Vec<&str> = stage.iter().map(|c| c.lang()).collect();
        assert_eq!(langs, vec!["cs", "en"]);
    }
}
