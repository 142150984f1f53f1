//! Loading components from strings definition files.
//!
//! A strings file is PHP source assigning texts into the `$string` array:
//!
//! ```text
//! $string['add'] = 'Add';
//! $string['addnew'] = "Add a new {$a}";
//! $string['long'] = 'First part, ' . 'second part';
//! ```
//!
//! Only literal assignments are understood. Nothing is evaluated, so
//! variables inside double-quoted literals are kept as written.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::mlang::component::ComponentSnapshot;
use crate::mlang::errors::{MlangError, MlangResult};
use crate::mlang::revision::StringRevision;
use crate::mlang::syntax::fix_syntax;
use crate::mlang::version::Version;
use crate::storage::Timestamp;

static STRING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9.:/_-]*$").expect("valid string id pattern"));

/// Whether `id` may be used as a string identifier.
pub fn is_valid_string_id(id: &str) -> bool {
    STRING_ID.is_match(id)
}

/// Component name implied by a strings file path (its stem).
pub fn name_from_filename(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract every `$string[key] = value;` assignment, in file order.
pub fn parse_strings(source: &str) -> Vec<(String, String)> {
    let mut scanner = Scanner::new(source);
    let mut found = Vec::new();

    while !scanner.at_end() {
        scanner.skip_trivia();
        match scanner.peek() {
            None => break,
            Some('$') => {
                let start = scanner.pos;
                match scanner.assignment() {
                    Some(pair) => found.push(pair),
                    None => scanner.pos = start + 1,
                }
            }
            Some('\'') | Some('"') => {
                scanner.literal();
            }
            Some(_) => scanner.pos += 1,
        }
    }

    found
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, expected: char) -> Option<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn eat_word(&mut self, word: &str) -> Option<()> {
        let matches = word
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c));
        if !matches {
            return None;
        }
        self.pos += word.chars().count();
        Some(())
    }

    /// whitespace and comments
    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) | (Some('#'), _) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.pos += 1;
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while !self.at_end() && !(self.peek() == Some('*') && self.peek_at(1) == Some('/')) {
                        self.pos += 1;
                    }
                    self.pos = (self.pos + 2).min(self.chars.len());
                }
                _ => return,
            }
        }
    }

    /// `$string [ key ] = value ;`
    fn assignment(&mut self) -> Option<(String, String)> {
        self.eat_word("$string")?;
        self.skip_trivia();
        self.eat('[')?;
        self.skip_trivia();
        let key = self.literal()?;
        self.skip_trivia();
        self.eat(']')?;
        self.skip_trivia();
        self.eat('=')?;
        self.skip_trivia();

        let mut value = self.literal()?;
        loop {
            self.skip_trivia();
            if self.eat('.').is_none() {
                break;
            }
            self.skip_trivia();
            value.push_str(&self.literal()?);
        }
        self.eat(';')?;

        Some((key, value))
    }

    /// a single- or double-quoted literal, unescaped
    fn literal(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| *c == '\'' || *c == '"')?;
        self.pos += 1;

        let mut text = String::new();
        loop {
            let c = self.peek()?;
            self.pos += 1;
            if c == quote {
                return Some(text);
            }
            if c != '\\' {
                text.push(c);
                continue;
            }

            let next = self.peek()?;
            let unescaped = match (quote, next) {
                ('\'', '\'') | ('\'', '\\') => Some(next),
                ('"', '"') | ('"', '\\') | ('"', '$') => Some(next),
                ('"', 'n') => Some('\n'),
                ('"', 't') => Some('\t'),
                ('"', 'r') => Some('\r'),
                ('"', 'v') => Some('\x0B'),
                ('"', 'f') => Some('\x0C'),
                _ => None,
            };
            match unescaped {
                Some(u) => {
                    text.push(u);
                    self.pos += 1;
                }
                None => text.push('\\'),
            }
        }
    }
}

fn modified_at(path: &Path) -> io::Result<Timestamp> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}

impl ComponentSnapshot {
    /// Load a component from a strings definition file.
    ///
    /// The name defaults to the file stem and the revision time to the file
    /// modification time. Texts are normalized for the version's placeholder
    /// syntax; assignments with invalid string ids are skipped.
    pub fn from_phpfile(
        path: impl AsRef<Path>,
        lang: &str,
        version: &'static Version,
        timemodified: Option<Timestamp>,
        name: Option<&str>,
    ) -> MlangResult<Self> {
        let path = path.as_ref();
        let missing = |e: io::Error| MlangError::MissingResource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let source = fs::read_to_string(path).map_err(missing)?;
        let timemodified = match timemodified {
            Some(t) => t,
            None => modified_at(path).map_err(missing)?,
        };
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => name_from_filename(path),
        };

        let strings = parse_strings(&source);
        if strings.is_empty() {
            tracing::debug!(path = %path.display(), "no strings defined");
        }

        let mut component = ComponentSnapshot::new(name, lang, version);
        for (id, text) in strings {
            if !is_valid_string_id(&id) {
                continue;
            }
            let text = fix_syntax(&text, version.syntax_format(), None)?;
            component.add_string(StringRevision::new(id, text, Some(timemodified)), true)?;
        }

        Ok(component)
    }
}
