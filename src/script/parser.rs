//! Instruction parser and script extraction.
//!
//! An instruction is a command, a single space and an argument string:
//!
//! ```text
//! CPY [welcome,core],[greeting,core_admin]
//! MOV [old,mod_forum],[new,mod_forum]
//! HLP forum/posting.html,[posting_help,mod_forum]
//! REM anything
//! ```
//!
//! Component names use the prefixed scheme (`core`, `core_admin`,
//! `mod_forum`) and are converted to the legacy names the log is keyed by.

use std::sync::LazyLock;

use regex::Regex;

use crate::mlang::trim_blank;
use crate::script::ast::{Instruction, StringRef};
use crate::script::error::{ParseError, ParseResult};

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?smi)^\s*AMOS\s+(BEGIN|START)\s+(.+)\s+AMOS\s+END\s*$")
        .expect("valid script block pattern")
});

static TWO_REFS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.+),(.+)\]\s*,\s*\[(.+),(.+)\]").expect("valid string refs pattern")
});

static FILE_AND_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.+),\s*\[(.+),(.+)\]").expect("valid help file pattern")
});

/// Parser for script instructions.
pub struct Parser;

impl Parser {
    /// Parse one instruction line.
    pub fn parse(line: &str) -> ParseResult<Instruction> {
        let (command, arguments) = match line.find(' ') {
            Some(pos) => (trim_blank(&line[..pos]), trim_blank(&line[pos + 1..])),
            None => (trim_blank(line), ""),
        };

        match command {
            "" => Err(ParseError::Empty),
            "CPY" => {
                let (from, to) = Self::two_refs("CPY", arguments)?;
                Ok(Instruction::Copy { from, to })
            }
            "MOV" => {
                let (from, to) = Self::two_refs("MOV", arguments)?;
                Ok(Instruction::Move { from, to })
            }
            "HLP" => {
                let caps = FILE_AND_REF
                    .captures(arguments)
                    .ok_or_else(|| malformed("HLP", arguments))?;
                Ok(Instruction::MigrateHelp {
                    helpfile: trim_blank(&caps[1]).to_string(),
                    to: string_ref(&caps[2], &caps[3]),
                })
            }
            "REM" => Ok(Instruction::Comment(arguments.to_string())),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    /// `[id,component],[id,component]`
    fn two_refs(command: &'static str, arguments: &str) -> ParseResult<(StringRef, StringRef)> {
        let caps = TWO_REFS
            .captures(arguments)
            .ok_or_else(|| malformed(command, arguments))?;
        Ok((string_ref(&caps[1], &caps[2]), string_ref(&caps[3], &caps[4])))
    }
}

fn malformed(command: &'static str, arguments: &str) -> ParseError {
    ParseError::MalformedArguments {
        command,
        arguments: arguments.to_string(),
    }
}

fn string_ref(id: &str, component: &str) -> StringRef {
    StringRef::new(trim_blank(id), legacy_component_name(trim_blank(component)))
}

/// Convert a prefixed component name into its legacy name.
///
/// `core` becomes `moodle`, `core_x` and `mod_x` become `x`; anything else is
/// already a legacy name.
pub fn legacy_component_name(name: &str) -> String {
    if name == "core" {
        return "moodle".to_string();
    }
    name.strip_prefix("core_")
        .or_else(|| name.strip_prefix("mod_"))
        .unwrap_or(name)
        .to_string()
}

/// Pull the script lines out of a free text (a commit message, say).
///
/// The script is everything between an `AMOS BEGIN` (or `AMOS START`) line
/// and an `AMOS END` line. Lines are trimmed and blank ones dropped; text
/// without a script yields no lines.
pub fn extract_script(text: &str) -> Vec<String> {
    let Some(caps) = SCRIPT_BLOCK.captures(text) else {
        return Vec::new();
    };
    caps[2]
        .split('\n')
        .map(trim_blank)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lines of a script file: its embedded script block if it has one,
/// otherwise every non-blank line, trimmed.
pub fn script_lines(text: &str) -> Vec<String> {
    let block = extract_script(text);
    if !block.is_empty() {
        return block;
    }
    text.lines()
        .map(trim_blank)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
