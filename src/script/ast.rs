//! Parsed instructions of the batch script language.

use std::fmt;

/// A string addressed by id and (legacy) component name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRef {
    pub id: String,
    pub component: String,
}

impl StringRef {
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
        }
    }
}

impl fmt::Display for StringRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.id, self.component)
    }
}

/// One script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// CPY: copy a string into a missing one, in every language.
    Copy { from: StringRef, to: StringRef },
    /// MOV: remove a string and copy it into a missing one, in every language.
    Move { from: StringRef, to: StringRef },
    /// HLP: turn a legacy help file into a missing string.
    MigrateHelp { helpfile: String, to: StringRef },
    /// REM: comment.
    Comment(String),
}

impl Instruction {
    /// The three-letter command of the instruction.
    pub fn command(&self) -> &'static str {
        match self {
            Instruction::Copy { .. } => "CPY",
            Instruction::Move { .. } => "MOV",
            Instruction::MigrateHelp { .. } => "HLP",
            Instruction::Comment(_) => "REM",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Copy { from, to } | Instruction::Move { from, to } => {
                write!(f, "{} {},{}", self.command(), from, to)
            }
            Instruction::MigrateHelp { helpfile, to } => write!(f, "HLP {},{}", helpfile, to),
            Instruction::Comment(text) if text.is_empty() => write!(f, "REM"),
            Instruction::Comment(text) => write!(f, "REM {}", text),
        }
    }
}
