//! Selector errors

use thiserror::Error;

/// Result type for selector operations
pub type SelectorResult<T> = Result<T, SelectorError>;

/// Errors raised while parsing or binding a selector.
///
/// All of these are client errors and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    /// Where clause does not follow the grammar
    #[error("invalid selector at position {position}: {message}")]
    Syntax { position: usize, message: String },

    /// Placeholder names a column that does not exist
    #[error("selector references unknown column '{0}'")]
    UnknownColumn(String),

    /// Placeholder is not a valid identifier
    #[error("invalid column name '{0}' in selector")]
    InvalidColumnName(String),

    /// Operator not supported for the column
    #[error("operator {op} is not supported for column '{column}'")]
    UnsupportedOperator { column: String, op: String },

    /// Wrong number of selector values
    #[error("selector expects {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// `ANY (?)` bound to a non-array value
    #[error("selector value {index} must be an array")]
    ExpectedArray { index: usize },

    /// Value does not parse as the column's type
    #[error("selector value {index} is invalid: {reason}")]
    InvalidValue { index: usize, reason: String },
}
