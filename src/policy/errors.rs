//! Policy errors

use thiserror::Error;
use uuid::Uuid;

/// Result type for policy operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised while validating or evaluating access policies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    // ==================
    // Definition Errors
    // ==================
    /// Policy definition is inconsistent
    #[error("invalid access policy: {0}")]
    InvalidPolicy(String),

    /// Thresholds out of range
    #[error("invalid access policy thresholds: {0}")]
    InvalidThresholds(String),

    // ==================
    // Evaluation Errors
    // ==================
    /// Referenced policy does not exist
    #[error("access policy {0} not found")]
    PolicyNotFound(Uuid),

    /// Referenced template does not exist
    #[error("access policy template {0} not found")]
    TemplateNotFound(Uuid),

    /// Template names a function the evaluator does not know
    #[error("unknown policy function '{0}'")]
    UnknownFunction(String),

    /// Template parameters do not fit the function
    #[error("invalid parameters for template '{template}': {reason}")]
    InvalidParameters { template: String, reason: String },

    /// Policies reference each other too deeply (or cyclically)
    #[error("access policy composition exceeds depth {0}")]
    CompositionTooDeep(usize),

    // ==================
    // Rate Limit Errors
    // ==================
    /// Rate limit store failed
    #[error("rate limit store error: {0}")]
    RateLimitStore(String),
}

impl PolicyError {
    /// True when the error stems from a bad definition supplied by a client
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PolicyError::InvalidPolicy(_) | PolicyError::InvalidThresholds(_)
        )
    }
}
