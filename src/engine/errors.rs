//! Engine boundary errors
//!
//! Every lower-level error converts into [`EngineError`], which carries the
//! HTTP-style status the caller sees.

use thiserror::Error;
use uuid::Uuid;

use crate::mutation::MutationError;
use crate::pagination::PaginationError;
use crate::policy::{PolicyError, ThresholdExceeded};
use crate::selector::SelectorError;
use crate::storage::StorageError;
use crate::transform::TransformError;

/// Result type for engine invocations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by accessor, mutator and token operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ==================
    // Lookup Errors
    // ==================
    #[error("accessor {0} not found")]
    AccessorNotFound(Uuid),

    #[error("mutator {0} not found")]
    MutatorNotFound(Uuid),

    #[error("column {0} not found")]
    ColumnNotFound(Uuid),

    #[error("transformer {0} not found")]
    TransformerNotFound(Uuid),

    #[error("access policy {0} not found")]
    PolicyNotFound(Uuid),

    #[error("purpose {0} not found")]
    PurposeNotFound(Uuid),

    #[error("token not found")]
    TokenNotFound,

    // ==================
    // Request Errors
    // ==================
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Announced threshold failure
    #[error("{}", .0.message())]
    ThresholdExceeded(ThresholdExceeded),

    // ==================
    // Execution Errors
    // ==================
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Caller cancelled the invocation
    #[error("invocation cancelled")]
    Cancelled,
}

impl EngineError {
    /// HTTP-style status code for the boundary
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::AccessorNotFound(_)
            | EngineError::MutatorNotFound(_)
            | EngineError::ColumnNotFound(_)
            | EngineError::TransformerNotFound(_)
            | EngineError::PolicyNotFound(_)
            | EngineError::PurposeNotFound(_)
            | EngineError::TokenNotFound => 404,

            EngineError::Pagination(_) | EngineError::Selector(_) => 400,
            EngineError::Mutation(e) if e.is_client_error() => 400,
            EngineError::ThresholdExceeded(ThresholdExceeded::Rate) => 429,
            EngineError::ThresholdExceeded(ThresholdExceeded::Result) => 400,

            EngineError::Policy(PolicyError::PolicyNotFound(_)) => 404,
            EngineError::Policy(e) if e.is_client_error() => 400,
            EngineError::Transform(TransformError::TransformerNotFound(_)) => 404,
            EngineError::Transform(e) if e.is_client_error() => 400,
            EngineError::Storage(e) if e.is_conflict() => 409,
            EngineError::Storage(StorageError::UserNotFound(_)) => 404,

            _ => 500,
        }
    }

    /// True for 4xx errors
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Stable error code for responses and logs
    pub fn code(&self) -> &'static str {
        match self.status_code() {
            400 => "BAD_REQUEST",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            429 => "TOO_MANY_REQUESTS",
            _ => "INTERNAL_ERROR",
        }
    }
}
