//! Repository API - high-level interface for AMOS.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mlang::{ComponentSnapshot, MlangError, SnapshotOptions, Version};
use crate::query::QueryFacade;
use crate::script::{extract_script, DirHelpSource, ScriptEngine, ScriptError, ScriptRun};
use crate::stage::{PersistentStagingArea, StageError, StagingArea};
use crate::storage::{
    DirBlobStore, FileLog, GitBlobStore, MemoryBlobStore, MemoryLog, SharedBlobStore, SharedLog,
    StageId, StorageError, Timestamp,
};

/// Result type for repository operations.
pub type AmosResult<T> = Result<T, AmosError>;

/// Repository errors.
#[derive(Debug, Error)]
pub enum AmosError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Mlang(#[from] MlangError),

    #[error("stage error: {0}")]
    Stage(#[from] StageError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    #[error("invalid configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where persistent stages are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStoreKind {
    /// process memory, lost on exit
    Memory,
    /// one file per stage
    Dir,
    /// one branch per stage in a bare git repository
    #[default]
    Git,
}

/// Repository configuration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmosConfig {
    /// Path to the JSON-lines log file.
    pub log_path: PathBuf,
    /// Backend for persistent stages.
    pub stage_store: StageStoreKind,
    /// Directory or repository of the stage store.
    pub stage_path: PathBuf,
    /// Root of the legacy help files used by HLP.
    pub help_root: Option<PathBuf>,
    /// Enable verbose logging.
    pub verbose: bool,
}

impl Default for AmosConfig {
    fn default() -> Self {
        Self::new(".amos")
    }
}

impl AmosConfig {
    /// Create a configuration keeping everything under `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            log_path: root.join("log.jsonl"),
            stage_store: StageStoreKind::default(),
            stage_path: root.join("stages.git"),
            help_root: None,
            verbose: false,
        }
    }

    /// Read a configuration from a JSON file; missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> AmosResult<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| AmosError::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))
    }

    /// Set the log file.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Set the stage store backend and its location.
    pub fn stage_store(mut self, kind: StageStoreKind, path: impl Into<PathBuf>) -> Self {
        self.stage_store = kind;
        self.stage_path = path.into();
        self
    }

    /// Set the help files root.
    pub fn help_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.help_root = Some(root.into());
        self
    }

    /// Set verbose flag.
    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }
}

/// The main repository handle.
///
/// Ties the log, the persistent stage store, the query facade and the
/// script engine together.
pub struct Amos {
    config: AmosConfig,
    log: SharedLog,
    stages: SharedBlobStore,
    query: Arc<QueryFacade>,
    engine: ScriptEngine,
}

impl Amos {
    /// Open or create a repository under the given directory.
    pub fn open(root: impl AsRef<Path>) -> AmosResult<Self> {
        Self::open_with_config(AmosConfig::new(root))
    }

    /// Open or create a repository with custom configuration.
    pub fn open_with_config(config: AmosConfig) -> AmosResult<Self> {
        let log: SharedLog = Arc::new(FileLog::open(&config.log_path)?);
        let stages: SharedBlobStore = match config.stage_store {
            StageStoreKind::Memory => Arc::new(MemoryBlobStore::new()),
            StageStoreKind::Dir => Arc::new(DirBlobStore::new(&config.stage_path)),
            StageStoreKind::Git => Arc::new(GitBlobStore::open_or_init(&config.stage_path)?),
        };

        tracing::debug!(
            log = %config.log_path.display(),
            stages = ?config.stage_store,
            "opened repository"
        );
        Ok(Self::assemble(config, log, stages))
    }

    /// Create a repository held entirely in memory (for testing).
    pub fn in_memory() -> Self {
        let config = AmosConfig::default().stage_store(StageStoreKind::Memory, "");
        Self::assemble(config, Arc::new(MemoryLog::new()), Arc::new(MemoryBlobStore::new()))
    }

    fn assemble(config: AmosConfig, log: SharedLog, stages: SharedBlobStore) -> Self {
        let query = Arc::new(QueryFacade::new(log.clone()));
        let mut engine = ScriptEngine::new(query.clone());
        if let Some(root) = &config.help_root {
            engine = engine.with_help_source(Arc::new(DirHelpSource::new(root)));
        }

        Self {
            config,
            log,
            stages,
            query,
            engine,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &AmosConfig {
        &self.config
    }

    /// Get the repository log.
    pub fn log(&self) -> &SharedLog {
        &self.log
    }

    /// Get the query facade.
    pub fn query(&self) -> &QueryFacade {
        &self.query
    }

    /// Get the script engine.
    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// Create an empty stage over the log.
    pub fn stage(&self) -> StagingArea {
        StagingArea::new(self.log.clone())
    }

    /// Open the persistent stage of an owner, restoring its stored state.
    ///
    /// Without a stage id a fresh one is generated and the stage starts
    /// empty; read it back from [`PersistentStagingArea::stage_id`].
    pub fn persistent_stage(
        &self,
        owner: impl Into<String>,
        stage_id: Option<&str>,
    ) -> AmosResult<PersistentStagingArea> {
        let stage = match stage_id {
            Some(id) => {
                PersistentStagingArea::instance_for(owner, id, self.log.clone(), self.stages.clone())?
            }
            None => {
                let id = StageId::generate();
                tracing::debug!(stage = %id, "generated stage id");
                PersistentStagingArea::new(owner, id.as_str(), self.log.clone(), self.stages.clone())?
            }
        };
        Ok(stage)
    }

    /// Read a component as of `options`.
    pub fn snapshot(
        &self,
        name: &str,
        lang: &str,
        version: &'static Version,
        options: &SnapshotOptions,
    ) -> AmosResult<ComponentSnapshot> {
        Ok(ComponentSnapshot::from_snapshot(
            self.log.as_ref(),
            name,
            lang,
            version,
            options,
        )?)
    }

    /// Run the script block embedded in `text` (a commit message, say).
    ///
    /// Text without an `AMOS BEGIN`/`AMOS END` block runs nothing.
    pub fn run_script(
        &self,
        text: &str,
        version: &'static Version,
        timestamp: Option<Timestamp>,
    ) -> AmosResult<ScriptRun> {
        let lines = extract_script(text);
        Ok(self.engine.run(lines, version, timestamp)?)
    }

    /// Commit a stage and drop cached query results.
    pub fn commit(&self, stage: &mut StagingArea, message: &str, skip_rebase: bool) -> AmosResult<usize> {
        let appended = stage.commit(message, None, skip_rebase)?;
        if appended > 0 {
            self.query.invalidate();
        }
        Ok(appended)
    }
}

impl std::fmt::Debug for Amos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Amos")
            .field("config", &self.config)
            .field("query", &self.query)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlang::{StringRevision, VersionRegistry};
    use crate::storage::RepositoryLog;
    use tempfile::TempDir;

    fn v20() -> &'static Version {
        VersionRegistry::by_code(2000).unwrap()
    }

    /// English and Czech, both with `welcome`
    fn seed(amos: &Amos) {
        let mut stage = amos.stage();
        for (lang, name, welcome) in [("en", "English", "Welcome"), ("cs", "Čeština", "Vítejte")] {
            let mut langconfig = ComponentSnapshot::new("langconfig", lang, v20());
            langconfig
                .add_string(StringRevision::new("thislanguage", name, Some(1)), false)
                .unwrap();
            let mut moodle = ComponentSnapshot::new("moodle", lang, v20());
            moodle
                .add_string(StringRevision::new("welcome", welcome, Some(1)), false)
                .unwrap();
            stage.add(&langconfig, false).unwrap();
            stage.add(&moodle, false).unwrap();
        }
        assert_eq!(amos.commit(&mut stage, "Initial import", false).unwrap(), 4);
    }

    #[test]
    fn test_open_creates_files_and_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let amos = Amos::open(dir.path()).unwrap();
            seed(&amos);
        }
        assert!(dir.path().join("log.jsonl").is_file());

        let amos = Amos::open(dir.path()).unwrap();
        assert_eq!(amos.log().len().unwrap(), 4);
        let languages = amos.query().list_languages(true).unwrap();
        assert_eq!(languages.keys().cloned().collect::<Vec<_>>(), vec!["cs", "en"]);
    }

    #[test]
    fn test_run_script_from_commit_message() {
        let amos = Amos::in_memory();
        seed(&amos);

        let message = "MDL-1234 rename the welcome string\n\nAMOS BEGIN\n MOV [welcome,core],[greeting,core]\nAMOS END\n";
        let mut run = amos.run_script(message, v20(), Some(10)).unwrap();
        assert_eq!(run.lines.len(), 1);
        assert_eq!(amos.commit(&mut run.stage, message, false).unwrap(), 4);

        let moodle = amos
            .snapshot("moodle", "cs", v20(), &SnapshotOptions::new())
            .unwrap();
        assert!(!moodle.has_string("welcome"));
        assert_eq!(
            moodle.get_string("greeting").unwrap().text.as_deref(),
            Some("Vítejte")
        );
    }

    #[test]
    fn test_text_without_script_runs_nothing() {
        let amos = Amos::in_memory();
        seed(&amos);
        let run = amos.run_script("Just a fix", v20(), None).unwrap();
        assert!(run.lines.is_empty());
        assert!(run.stage.is_empty());
    }

    #[test]
    fn test_commit_invalidates_cached_languages() {
        let amos = Amos::in_memory();
        seed(&amos);
        assert_eq!(amos.query().list_languages(true).unwrap().len(), 2);

        let mut stage = amos.stage();
        let mut langconfig = ComponentSnapshot::new("langconfig", "de", v20());
        langconfig
            .add_string(StringRevision::new("thislanguage", "Deutsch", Some(5)), false)
            .unwrap();
        stage.add(&langconfig, false).unwrap();
        amos.commit(&mut stage, "Add German", false).unwrap();

        assert_eq!(amos.query().list_languages(true).unwrap().len(), 3);
    }

    #[test]
    fn test_persistent_stage_through_handle() {
        let dir = TempDir::new().unwrap();
        let config = AmosConfig::new(dir.path()).stage_store(StageStoreKind::Dir, dir.path().join("stages"));
        let amos = Amos::open_with_config(config).unwrap();

        let mut stage = amos.persistent_stage("42", Some("sess")).unwrap();
        let mut component = ComponentSnapshot::new("moodle", "en", v20());
        component
            .add_string(StringRevision::new("add", "Add", Some(1)), false)
            .unwrap();
        stage.add(&component, false).unwrap();
        assert!(stage.store());

        let restored = amos.persistent_stage("42", Some("sess")).unwrap();
        assert_eq!(restored.revision_count(), 1);
        assert!(matches!(
            amos.persistent_stage("", Some("sess")),
            Err(AmosError::Stage(StageError::Identity { .. }))
        ));
    }

    #[test]
    fn test_persistent_stage_generates_id() {
        let amos = Amos::in_memory();

        let mut first = amos.persistent_stage("42", None).unwrap();
        let second = amos.persistent_stage("42", None).unwrap();
        assert_ne!(first.stage_id(), second.stage_id());
        assert!(first.is_empty());

        let mut component = ComponentSnapshot::new("moodle", "en", v20());
        component
            .add_string(StringRevision::new("add", "Add", Some(1)), false)
            .unwrap();
        first.add(&component, false).unwrap();
        assert!(first.store());

        let id = first.stage_id().as_str().to_string();
        let reopened = amos.persistent_stage("42", Some(&id)).unwrap();
        assert_eq!(reopened.revision_count(), 1);
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("amos.json");
        fs::write(&path, r#"{"log_path": "/srv/amos/log.jsonl", "stage_store": "dir", "verbose": true}"#).unwrap();

        let config = AmosConfig::load(&path).unwrap();
        assert_eq!(config.log_path, PathBuf::from("/srv/amos/log.jsonl"));
        assert_eq!(config.stage_store, StageStoreKind::Dir);
        assert_eq!(config.stage_path, PathBuf::from(".amos/stages.git"));
        assert!(config.verbose);
        assert_eq!(config.help_root, None);

        fs::write(&path, r#"{"stage_store": "s3"}"#).unwrap();
        assert!(matches!(
            AmosConfig::load(&path),
            Err(AmosError::InvalidConfig { .. })
        ));
        assert!(AmosConfig::load(dir.path().join("missing.json")).is_err());
    }
}
