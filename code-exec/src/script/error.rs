use thiserror::Error;

use super::token::Position;

/// Failures raised while evaluating a well-formed program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("type mismatch: cannot apply `{op}` to {left} and {right}")]
    BinaryTypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("type mismatch: cannot apply `{op}` to {operand}")]
    UnaryTypeMismatch { op: &'static str, operand: &'static str },

    #[error("condition must be a boolean, found {0}")]
    NonBooleanCondition(&'static str),

    #[error("operands of `{op}` must be booleans, found {found}")]
    NonBooleanOperand { op: &'static str, found: &'static str },

    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),

    #[error("function `{name}` expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{0}: {1}")]
    Builtin(&'static str, String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("stack overflow: call depth exceeded {0}")]
    StackOverflow(usize),

    #[error("stack overflow: evaluation nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("value of type {0} cannot be indexed")]
    NotIndexable(&'static str),

    #[error("index must be a non-negative integer, found {0}")]
    InvalidIndex(String),

    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: f64, len: usize },

    #[error("arrays cannot nest deeper than {0} levels")]
    ArrayTooDeep(usize),

    #[error("output limit exceeded ({0} bytes)")]
    OutputLimitExceeded(usize),
}

/// Every way a custom-language submission can fail, from lexing to evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("lexer error at {position}: {message}")]
    Lex { message: String, position: Position },

    #[error("parser error at {position}: expected {expected}, found {found}")]
    Parse {
        expected: String,
        found: String,
        position: Position,
    },

    #[error("runtime error at {position}: {error}")]
    Runtime {
        error: RuntimeError,
        position: Position,
    },

    #[error("execution timed out after {0} ms")]
    Timeout(u64),

    #[error("memory limit exceeded: {used} bytes retained, limit is {limit} bytes")]
    MemoryLimit { used: u64, limit: u64 },
}

impl ScriptError {
    pub(crate) fn lex(message: impl Into<String>, position: Position) -> Self {
        ScriptError::Lex {
            message: message.into(),
            position,
        }
    }

    pub(crate) fn parse(
        expected: impl Into<String>,
        found: impl Into<String>,
        position: Position,
    ) -> Self {
        ScriptError::Parse {
            expected: expected.into(),
            found: found.into(),
            position,
        }
    }

    pub(crate) fn runtime(error: RuntimeError, position: Position) -> Self {
        ScriptError::Runtime { error, position }
    }
}

pub type ScriptResult<T> = std::result::Result<T, ScriptError>;
