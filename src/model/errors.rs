//! Model validation errors

use thiserror::Error;

/// Result type for model validation
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised when an object definition is not well formed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Object has an empty name
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    /// Accessor or mutator without columns
    #[error("{0} must declare at least one column")]
    NoColumns(&'static str),

    /// The same column listed twice
    #[error("column {0} is listed more than once")]
    DuplicateColumn(String),

    /// Accessor without purposes
    #[error("accessor must declare at least one purpose")]
    NoPurposes,

    /// Selector where clause is blank
    #[error("selector where clause must not be empty")]
    EmptySelector,

    /// Column definition is inconsistent
    #[error("invalid column {column}: {reason}")]
    InvalidColumn { column: String, reason: String },
}
