//! Script errors.

use thiserror::Error;

use crate::mlang::MlangError;
use crate::stage::StageError;
use crate::storage::StorageError;

/// Result type for parsing instructions.
pub type ParseResult<T> = Result<T, ParseError>;

/// Why an instruction line was rejected.
///
/// Returned inside a syntax error outcome, never raised by execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty instruction")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed arguments for {command}: '{arguments}'")]
    MalformedArguments {
        command: &'static str,
        arguments: String,
    },
}

/// Result type for executing instructions.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Failures of the underlying repository while executing a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Mlang(#[from] MlangError),

    #[error("{0}")]
    Stage(#[from] StageError),
}
