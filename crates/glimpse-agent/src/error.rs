//! Agent error taxonomy.
//!
//! Every failure the agent can produce is contained to the affected
//! breakpoint's status or to local logs. Nothing in this crate panics
//! into the host program's control flow.

use smol_str::SmolStr;
use thiserror::Error;

/// Failure to map a requested (file, line) to an executable statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The requested file is not part of the program index.
    #[error("unknown file '{0}'")]
    UnknownFile(SmolStr),

    /// No executable statement exists at or after the requested line
    /// within its enclosing block.
    #[error("no executable statement at or after {file}:{line}")]
    NoStatement {
        /// Requested file path.
        file: SmolStr,
        /// Requested 1-based line.
        line: u32,
    },
}

/// Failure while evaluating a condition or log template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Variable is not present in the captured scope.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(SmolStr),

    /// Field is not present on the accessed composite value.
    #[error("undefined field '{0}'")]
    UndefinedField(SmolStr),

    /// Index is outside the bounds of the accessed list.
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// Requested index.
        index: i64,
        /// Length of the indexed list.
        len: usize,
    },

    /// Operand types do not fit the operator.
    #[error("type mismatch")]
    TypeMismatch,

    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A breakpoint condition evaluated to a non-boolean value.
    #[error("condition is not a boolean")]
    ConditionNotBool,

    /// The expression or template could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The accessed value was truncated during capture.
    #[error("value was truncated during capture")]
    Truncated,
}

/// Failure talking to the external breakpoint storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The storage backend could not be reached or read.
    #[error("breakpoint storage unavailable: {0}")]
    Unavailable(String),

    /// The stored document could not be decoded.
    #[error("breakpoint storage corrupt: {0}")]
    Corrupt(String),
}
