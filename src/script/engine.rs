//! Execution of script instructions against the repository.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::mlang::{trim_blank, ComponentSnapshot, SnapshotOptions, StringRevision, Version};
use crate::query::QueryFacade;
use crate::script::ast::{Instruction, StringRef};
use crate::script::error::{ParseError, ScriptResult};
use crate::script::help::SharedHelpSource;
use crate::script::parser::Parser;
use crate::stage::StagingArea;
use crate::storage::{now, SharedLog, Timestamp};

static HELP_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h1>.*</h1>").expect("valid heading pattern"));

/// Result of executing one instruction.
#[derive(Debug)]
pub enum Outcome {
    /// Edits to be committed; possibly empty.
    Staged(StagingArea),
    /// Nothing to do (comments).
    Done,
    /// The instruction could not be understood.
    SyntaxError(ParseError),
}

/// Per-line status of a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    /// number of revisions the line staged
    Staged(usize),
    Done,
    SyntaxError(ParseError),
}

/// Result of running a whole script.
#[derive(Debug)]
pub struct ScriptRun {
    /// edits of every line, merged
    pub stage: StagingArea,
    /// one entry per line, in order
    pub lines: Vec<(String, LineStatus)>,
}

impl ScriptRun {
    /// Number of lines rejected as syntax errors.
    pub fn syntax_errors(&self) -> usize {
        self.lines
            .iter()
            .filter(|(_, status)| matches!(status, LineStatus::SyntaxError(_)))
            .count()
    }
}

/// Executes instructions for every known language.
pub struct ScriptEngine {
    log: SharedLog,
    query: Arc<QueryFacade>,
    help: Option<SharedHelpSource>,
}

impl ScriptEngine {
    /// Create an engine reading languages through `query`.
    pub fn new(query: Arc<QueryFacade>) -> Self {
        Self {
            log: query.log().clone(),
            query,
            help: None,
        }
    }

    /// Use `help` to read help files for HLP instructions.
    pub fn with_help_source(mut self, help: SharedHelpSource) -> Self {
        self.help = Some(help);
        self
    }

    /// Parse and execute one instruction line on `version`.
    ///
    /// Snapshots are taken as of `timestamp` (most recent when unset) and new
    /// revisions are stamped with it (now when unset). Lines that cannot be
    /// parsed give [`Outcome::SyntaxError`]; only repository failures are
    /// errors.
    pub fn execute(
        &self,
        line: &str,
        version: &'static Version,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<Outcome> {
        match Parser::parse(line) {
            Ok(instruction) => self.execute_instruction(&instruction, version, timestamp),
            Err(e) => {
                tracing::debug!(line, error = %e, "syntax error");
                Ok(Outcome::SyntaxError(e))
            }
        }
    }

    /// Execute an already parsed instruction.
    pub fn execute_instruction(
        &self,
        instruction: &Instruction,
        version: &'static Version,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<Outcome> {
        tracing::debug!(%instruction, branch = version.code, "executing instruction");
        let stage = match instruction {
            Instruction::Copy { from, to } => self.copy_string(version, from, to, timestamp)?,
            Instruction::Move { from, to } => self.move_string(version, from, to, timestamp)?,
            Instruction::MigrateHelp { helpfile, to } => {
                self.migrate_helpfile(version, helpfile, to, timestamp)?
            }
            Instruction::Comment(_) => return Ok(Outcome::Done),
        };
        Ok(Outcome::Staged(stage))
    }

    /// Execute every line independently and merge the staged edits.
    pub fn run<I, S>(
        &self,
        lines: I,
        version: &'static Version,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<ScriptRun>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stage = StagingArea::new(self.log.clone());
        let mut statuses = Vec::new();

        for line in lines {
            let line = line.as_ref();
            let status = match self.execute(line, version, timestamp)? {
                Outcome::Staged(staged) => {
                    let count = staged.revision_count();
                    stage.absorb(staged, true)?;
                    LineStatus::Staged(count)
                }
                Outcome::Done => LineStatus::Done,
                Outcome::SyntaxError(e) => LineStatus::SyntaxError(e),
            };
            statuses.push((line.to_string(), status));
        }

        let run = ScriptRun { stage, lines: statuses };
        tracing::info!(
            lines = run.lines.len(),
            staged = run.stage.revision_count(),
            syntax_errors = run.syntax_errors(),
            branch = version.code,
            "executed script"
        );
        Ok(run)
    }

    /// one string of a component, as of `timestamp`
    fn snapshot(
        &self,
        target: &StringRef,
        lang: &str,
        version: &'static Version,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<ComponentSnapshot> {
        let options = SnapshotOptions::new().at(timestamp).only([target.id.as_str()]);
        Ok(ComponentSnapshot::from_snapshot(
            self.log.as_ref(),
            &target.component,
            lang,
            version,
            &options,
        )?)
    }

    /// Copy `from` into `to` wherever the source is live and the target missing.
    fn copy_string(
        &self,
        version: &'static Version,
        from: &StringRef,
        to: &StringRef,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<StagingArea> {
        let mut stage = StagingArea::new(self.log.clone());
        let stamp = timestamp.unwrap_or_else(now);

        for lang in self.query.list_languages(true)?.keys() {
            let source = self.snapshot(from, lang, version, timestamp)?;
            let mut target = self.snapshot(to, lang, version, timestamp)?;

            if let Some(text) = source.get_string(&from.id).map(|s| s.text.clone()) {
                if !target.has_string(&to.id) {
                    target.add_string(revision(&to.id, text, stamp), false)?;
                    stage.add(&target, false)?;
                }
            }
        }

        Ok(stage)
    }

    /// Remove `from` and copy it into `to` if missing, in every language
    /// having the source.
    fn move_string(
        &self,
        version: &'static Version,
        from: &StringRef,
        to: &StringRef,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<StagingArea> {
        let mut stage = StagingArea::new(self.log.clone());
        let stamp = timestamp.unwrap_or_else(now);

        for lang in self.query.list_languages(true)?.keys() {
            let mut source = self.snapshot(from, lang, version, timestamp)?;
            let mut target = self.snapshot(to, lang, version, timestamp)?;

            let Some(text) = source.get_string(&from.id).map(|s| s.text.clone()) else {
                continue;
            };

            source.add_string(StringRevision::removal(&from.id, text.clone(), Some(stamp)), true)?;
            stage.add(&source, false)?;
            if !target.has_string(&to.id) {
                target.add_string(revision(&to.id, text, stamp), false)?;
                stage.add(&target, false)?;
            }
        }

        Ok(stage)
    }

    /// Turn a help file into the string `to` wherever that is missing.
    fn migrate_helpfile(
        &self,
        version: &'static Version,
        helpfile: &str,
        to: &StringRef,
        timestamp: Option<Timestamp>,
    ) -> ScriptResult<StagingArea> {
        let mut stage = StagingArea::new(self.log.clone());
        let Some(help) = &self.help else {
            tracing::warn!(helpfile, "no help source configured, skipping HLP");
            return Ok(stage);
        };
        let stamp = timestamp.unwrap_or_else(now);

        for lang in self.query.list_languages(true)?.keys() {
            let Some(raw) = help.read(lang, helpfile) else {
                continue;
            };
            let stripped = HELP_HEADING.replace_all(&raw, "");
            let text = trim_blank(&stripped);
            if text.is_empty() {
                continue;
            }

            let mut target = self.snapshot(to, lang, version, timestamp)?;
            if !target.has_string(&to.id) {
                target.add_string(revision(&to.id, Some(text.to_string()), stamp), false)?;
                stage.add(&target, false)?;
            }
        }

        Ok(stage)
    }
}

fn revision(id: &str, text: Option<String>, timemodified: Timestamp) -> StringRevision {
    StringRevision {
        id: id.to_string(),
        text,
        timemodified,
        deleted: false,
        extra: None,
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("query", &self.query)
            .field("help", &self.help.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::mlang::VersionRegistry;
    use crate::script::help::MemoryHelpSource;
    use crate::storage::{record, MemoryLog, RepositoryLog};

    fn v20() -> &'static Version {
        VersionRegistry::by_code(2000).unwrap()
    }

    /// log with English, Czech and German, `welcome` existing in en and cs
    fn setup() -> (MemoryLog, ScriptEngine) {
        let log = MemoryLog::new();
        for (lang, name) in [("en", "English"), ("cs", "Čeština"), ("de", "Deutsch")] {
            log.insert(record(2000, lang, "langconfig", "thislanguage", name, 1)).unwrap();
        }
        log.insert(record(2000, "en", "moodle", "welcome", "Welcome", 10)).unwrap();
        log.insert(record(2000, "cs", "moodle", "welcome", "Vítejte", 10)).unwrap();

        let query = Arc::new(QueryFacade::new(Arc::new(log.clone())));
        (log, ScriptEngine::new(query))
    }

    fn staged(outcome: Outcome) -> StagingArea {
        match outcome {
            Outcome::Staged(stage) => stage,
            other => panic!("expected staged edits, got {:?}", other),
        }
    }

    #[test]
    fn test_copy_to_every_language_with_source() {
        let (_log, engine) = setup();
        let stage = staged(
            engine
                .execute("CPY [welcome,core],[greeting,core_admin]", v20(), Some(50))
                .unwrap(),
        );

        assert_eq!(stage.len(), 2);
        let cs = stage.get_component("admin", "cs", v20()).unwrap();
        let greeting = cs.get_string("greeting").unwrap();
        assert_eq!(greeting.text.as_deref(), Some("Vítejte"));
        assert_eq!(greeting.timemodified, 50);
        assert!(stage.has_component("admin", "en", v20()));
        assert!(!stage.has_component("admin", "de", v20()));
    }

    #[test]
    fn test_copy_keeps_existing_target() {
        let (log, engine) = setup();
        log.insert(record(2000, "cs", "admin", "greeting", "Ahoj", 10)).unwrap();

        let stage = staged(
            engine
                .execute("CPY [welcome,core],[greeting,core_admin]", v20(), None)
                .unwrap(),
        );
        assert!(!stage.has_component("admin", "cs", v20()));
        assert!(stage.has_component("admin", "en", v20()));
    }

    #[test]
    fn test_copy_ignores_deleted_source() {
        let (log, engine) = setup();
        let mut removal = record(2000, "cs", "moodle", "welcome", "Vítejte", 20);
        removal.deleted = true;
        log.insert(removal).unwrap();

        let stage = staged(
            engine
                .execute("CPY [welcome,core],[greeting,core]", v20(), None)
                .unwrap(),
        );
        assert_eq!(stage.len(), 1);
        assert!(stage.has_component("moodle", "en", v20()));
    }

    #[test]
    fn test_move_stages_removal_and_insert() {
        let (log, engine) = setup();
        log.insert(record(2000, "en", "workshop", "old", "Old text", 10)).unwrap();

        let stage = staged(
            engine
                .execute("MOV [old,mod_workshop],[new,mod_workshop]", v20(), Some(70))
                .unwrap(),
        );
        let component = stage.get_component("workshop", "en", v20()).unwrap();
        let old = component.get_string("old").unwrap();
        assert!(old.deleted);
        assert_eq!(old.text.as_deref(), Some("Old text"));
        let new = component.get_string("new").unwrap();
        assert!(!new.deleted);
        assert_eq!(new.text.as_deref(), Some("Old text"));
        assert_eq!(stage.len(), 1);
    }

    #[test]
    fn test_help_migration() {
        let (log, engine) = setup();
        log.insert(record(2000, "de", "forum", "posting_help", "Schon da", 3)).unwrap();

        let mut help = MemoryHelpSource::new();
        help.insert("en", "forum/posting.html", "<H1>Posting</H1>\n  <p>How to post</p>\n");
        help.insert("cs", "forum/posting.html", "<h1>Jen nadpis</h1>  ");
        help.insert("de", "forum/posting.html", "<p>Wie</p>");
        let engine = engine.with_help_source(Arc::new(help));

        let stage = staged(
            engine
                .execute("HLP forum/posting.html,[posting_help,mod_forum]", v20(), Some(5))
                .unwrap(),
        );
        assert_eq!(stage.len(), 1);
        let en = stage.get_component("forum", "en", v20()).unwrap();
        assert_eq!(
            en.get_string("posting_help").unwrap().text.as_deref(),
            Some("<p>How to post</p>")
        );
        assert_eq!(en.get_string("posting_help").unwrap().timemodified, 5);
    }

    #[test]
    fn test_help_migration_reads_target_as_of_timestamp() {
        let (log, engine) = setup();
        log.insert(record(2000, "de", "forum", "posting_help", "Schon da", 10)).unwrap();

        let mut help = MemoryHelpSource::new();
        help.insert("de", "forum/posting.html", "<p>Wie</p>");
        let engine = engine.with_help_source(Arc::new(help));

        let line = "HLP forum/posting.html,[posting_help,mod_forum]";
        let before = staged(engine.execute(line, v20(), Some(5)).unwrap());
        assert!(before.has_component("forum", "de", v20()));

        let after = staged(engine.execute(line, v20(), None).unwrap());
        assert!(after.is_empty());
    }

    #[test]
    fn test_comment_and_syntax_error() {
        let (_log, engine) = setup();
        assert!(matches!(engine.execute("REM hello", v20(), None).unwrap(), Outcome::Done));
        assert!(matches!(
            engine.execute("XXX foo", v20(), None).unwrap(),
            Outcome::SyntaxError(ParseError::UnknownCommand(_))
        ));
        assert!(matches!(
            engine.execute("CPY [a,b]", v20(), None).unwrap(),
            Outcome::SyntaxError(ParseError::MalformedArguments { .. })
        ));
    }

    #[test]
    fn test_run_accumulates_and_commits() {
        let (log, engine) = setup();
        let lines = [
            "REM copy the welcome text",
            "CPY [welcome,core],[greeting,core]",
            "BAD line",
            "CPY [missing,core],[other,core]",
        ];

        let mut run = engine.run(lines, v20(), Some(100)).unwrap();
        assert_eq!(run.syntax_errors(), 1);
        assert_eq!(
            run.lines.iter().map(|(_, s)| s.clone()).collect::<Vec<_>>(),
            vec![
                LineStatus::Done,
                LineStatus::Staged(2),
                LineStatus::SyntaxError(ParseError::UnknownCommand("BAD".into())),
                LineStatus::Staged(0),
            ]
        );

        let before = log.len().unwrap();
        assert_eq!(run.stage.commit("AMOS script", None, false).unwrap(), 2);
        assert_eq!(log.len().unwrap(), before + 2);
    }
}
