//! Catalog errors

use thiserror::Error;
use uuid::Uuid;

use crate::model::ModelError;
use crate::policy::PolicyError;
use crate::selector::SelectorError;
use crate::transform::TransformError;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised while registering definitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    // ==================
    // Reference Errors
    // ==================
    #[error("column {0} not found")]
    ColumnNotFound(Uuid),

    #[error("transformer {0} not found")]
    TransformerNotFound(Uuid),

    #[error("access policy {0} not found")]
    PolicyNotFound(Uuid),

    #[error("purpose {0} not found")]
    PurposeNotFound(Uuid),

    /// Another object of the same kind already uses the name
    #[error("{kind} name '{name}' is already in use")]
    DuplicateName { kind: &'static str, name: String },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}
