//! The batch script language.
//!
//! Scripts are embedded in free text between `AMOS BEGIN` and `AMOS END`
//! lines and perform bulk edits across all languages of a branch:
//!
//! ```text
//! AMOS BEGIN
//!  CPY [welcome,core],[greeting,core_admin]
//!  MOV [old,mod_forum],[new,mod_forum]
//! AMOS END
//! ```
//!
//! Executing an instruction never commits; it returns a stage for the
//! caller to commit.

mod ast;
mod engine;
mod error;
mod help;
mod parser;

pub use ast::{Instruction, StringRef};
pub use engine::{LineStatus, Outcome, ScriptEngine, ScriptRun};
pub use error::{ParseError, ParseResult, ScriptError, ScriptResult};
pub use help::{DirHelpSource, HelpSource, MemoryHelpSource, SharedHelpSource};
pub use parser::{extract_script, legacy_component_name, script_lines, Parser};
