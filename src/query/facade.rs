//! Aggregate read-only views over the whole log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::{LogFilter, SharedLog, StorageResult};

/// Component that carries a language's own name.
pub const LANGCONFIG_COMPONENT: &str = "langconfig";
/// String holding a language's own name.
pub const LANGUAGE_NAME_STRING: &str = "thislanguage";
/// Language whose components define the set of known components.
pub const MASTER_LANG: &str = "en";

/// branch code -> language -> components
pub type ComponentsTree = BTreeMap<u32, BTreeMap<String, BTreeSet<String>>>;

/// Restricts [`QueryFacade::components_tree`]; unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct TreeFilter {
    pub branch: Option<u32>,
    pub lang: Option<String>,
    pub component: Option<String>,
}

impl TreeFilter {
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
}

#[derive(Default)]
struct QueryCache {
    languages: Option<Arc<BTreeMap<String, String>>>,
    components: Option<Arc<BTreeSet<String>>>,
}

/// Language and component listings with an explicit cache.
///
/// Cached results are kept until [`invalidate`](QueryFacade::invalidate)
/// is called, commits do not refresh them.
pub struct QueryFacade {
    log: SharedLog,
    cache: RwLock<QueryCache>,
}

impl QueryFacade {
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            cache: RwLock::new(QueryCache::default()),
        }
    }

    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Known languages, code to name.
    ///
    /// A language is known once it names itself in `langconfig`. The name
    /// comes from the newest branch, then the newest revision on it.
    pub fn list_languages(&self, use_cache: bool) -> StorageResult<Arc<BTreeMap<String, String>>> {
        if use_cache {
            if let Some(languages) = self.cache.read().languages.clone() {
                return Ok(languages);
            }
        }

        let mut rows = self.log.select(
            &LogFilter::new()
                .component(LANGCONFIG_COMPONENT)
                .string_ids([LANGUAGE_NAME_STRING]),
        )?;
        rows.sort_by(|a, b| {
            b.record
                .branch
                .cmp(&a.record.branch)
                .then_with(|| b.record.timemodified.cmp(&a.record.timemodified))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut languages = BTreeMap::new();
        for row in rows {
            languages
                .entry(row.record.lang)
                .or_insert_with(|| row.record.text.unwrap_or_default());
        }

        let languages = Arc::new(languages);
        tracing::debug!(count = languages.len(), "listed languages");
        self.cache.write().languages = Some(languages.clone());
        Ok(languages)
    }

    /// Components that exist in English on at least one branch.
    pub fn list_components(&self, use_cache: bool) -> StorageResult<Arc<BTreeSet<String>>> {
        if use_cache {
            if let Some(components) = self.cache.read().components.clone() {
                return Ok(components);
            }
        }

        let rows = self
            .log
            .select(&LogFilter::new().lang(MASTER_LANG).include_deleted(true))?;
        let components: BTreeSet<String> = rows.into_iter().map(|row| row.record.component).collect();

        let components = Arc::new(components);
        self.cache.write().components = Some(components.clone());
        Ok(components)
    }

    /// Every (branch, language, component) with at least one row.
    pub fn components_tree(&self, filter: &TreeFilter) -> StorageResult<ComponentsTree> {
        let mut log_filter = LogFilter::new().include_deleted(true);
        log_filter.branch = filter.branch;
        log_filter.lang = filter.lang.clone();
        log_filter.component = filter.component.clone();

        let mut tree = ComponentsTree::new();
        for row in self.log.select(&log_filter)? {
            tree.entry(row.record.branch)
                .or_default()
                .entry(row.record.lang)
                .or_default()
                .insert(row.record.component);
        }
        Ok(tree)
    }

    /// Forget cached listings.
    pub fn invalidate(&self) {
        *self.cache.write() = QueryCache::default();
    }
}

impl std::fmt::Debug for QueryFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.read();
        f.debug_struct("QueryFacade")
            .field("languages_cached", &cache.languages.is_some())
            .field("components_cached", &cache.components.is_some())
            .finish()
    }
}
