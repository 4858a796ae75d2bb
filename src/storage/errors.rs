//! Storage errors

use thiserror::Error;
use uuid::Uuid;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by user stores
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    // ==================
    // Write Conflicts
    // ==================
    /// Another user already holds the value of a unique column
    #[error("column '{column}' value {value} is already in use")]
    UniqueViolation { column: String, value: String },

    /// Row changed between read and write
    #[error("user {0} was modified concurrently")]
    ConcurrentModification(Uuid),

    /// Insert of an id that already exists
    #[error("user {0} already exists")]
    DuplicateUser(Uuid),

    // ==================
    // Lookup Errors
    // ==================
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    // ==================
    // Backend Errors
    // ==================
    /// Store cannot serve the request
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// True for write conflicts the caller may resolve by changing input
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::UniqueViolation { .. }
                | StorageError::ConcurrentModification(_)
                | StorageError::DuplicateUser(_)
        )
    }
}
