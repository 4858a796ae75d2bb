//! Transformer and token errors

use thiserror::Error;
use uuid::Uuid;

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised while validating or executing transformers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    // ==================
    // Definition Errors
    // ==================
    /// Transformer definition is inconsistent
    #[error("invalid transformer: {0}")]
    InvalidTransformer(String),

    /// Referenced transformer does not exist
    #[error("transformer {0} not found")]
    TransformerNotFound(Uuid),

    /// Transformer cannot take values of the column's type
    #[error("transformer '{transformer}' accepts {expected} input, column '{column}' is {found}")]
    InputTypeMismatch {
        transformer: String,
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Tokenizing transformer used without a token access policy
    #[error("tokenizing transformer '{0}' requires a token access policy")]
    TokenPolicyRequired(String),

    // ==================
    // Execution Errors
    // ==================
    /// Transformer names a function the evaluator does not know
    #[error("unknown transformer function '{0}'")]
    UnknownFunction(String),

    /// Could not mint a unique token
    #[error("exceeded {attempts} attempts to generate a unique token for transformer '{transformer}'")]
    TokenCollision { transformer: String, attempts: usize },

    /// Token store failed
    #[error("token store error: {0}")]
    TokenStore(String),
}

impl TransformError {
    /// True when the error stems from a bad definition
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TransformError::InvalidTransformer(_)
                | TransformError::InputTypeMismatch { .. }
                | TransformError::TokenPolicyRequired(_)
        )
    }
}
