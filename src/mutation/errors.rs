//! Mutation errors

use thiserror::Error;

use crate::model::ValueError;
use crate::transform::TransformError;

/// Result type for mutation operations
pub type MutationResult<T> = Result<T, MutationError>;

/// Errors raised while validating or applying column mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    // ==================
    // Request Errors
    // ==================
    /// Row data names a column the mutator does not write
    #[error("column '{0}' is not part of the mutator")]
    UnknownColumn(String),

    /// Row data omits one of the mutator's columns
    #[error("row data is missing column '{0}'")]
    MissingColumn(String),

    /// Request shape or purpose changes are inconsistent
    #[error("column '{column}' mutation {reason}")]
    InvalidRequest { column: String, reason: String },

    /// Default value sentinel used on a column without a default
    #[error("column '{0}' does not have a default value")]
    NoDefaultValue(String),

    #[error("invalid value for column '{column}': {source}")]
    InvalidValue {
        column: String,
        #[source]
        source: ValueError,
    },

    // ==================
    // Constraint Errors
    // ==================
    /// Attempt to change an immutable value
    #[error("column '{0}' is immutable and already set")]
    ImmutableColumn(String),

    /// Composite element without a usable unique id
    #[error("column '{column}' requires unique element ids: {reason}")]
    UniqueIdRequired { column: String, reason: String },

    // ==================
    // Normalization Errors
    // ==================
    #[error("normalizer failed: {0}")]
    Normalizer(#[from] TransformError),
}

impl MutationError {
    pub(crate) fn invalid(column: &str, reason: impl Into<String>) -> Self {
        MutationError::InvalidRequest {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// True for everything but normalizer failures caused by configuration
    pub fn is_client_error(&self) -> bool {
        match self {
            MutationError::Normalizer(e) => e.is_client_error(),
            _ => true,
        }
    }
}
