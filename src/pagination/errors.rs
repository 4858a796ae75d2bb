//! Pagination errors
//!
//! Every pagination error is a client error: the request is rejected before
//! any storage access happens.

use thiserror::Error;

/// Result type for pagination operations
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Errors raised while validating pagination options or cursors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    // ==================
    // Sort Key Errors
    // ==================
    /// No sort keys were requested
    #[error("sort key list must not be empty")]
    EmptySortKey,

    /// A sort key name is blank
    #[error("sort key names must not be empty")]
    EmptySortKeyName,

    /// `id` missing, or not in last position
    #[error("final sort key must be 'id'")]
    IdNotLast,

    /// Same key requested twice
    #[error("sort key '{0}' is specified more than once")]
    DuplicateSortKey(String),

    /// Key is neither a system key nor a column of the object
    #[error("sort key '{0}' is not supported")]
    UnsupportedSortKey(String),

    /// Key resolves to an array or composite column
    #[error("sort key '{key}' has unsortable type: {reason}")]
    UnsortableKeyType { key: String, reason: &'static str },

    /// Soft-deleted data may only be sorted by system keys
    #[error("sort key '{0}' is not a system key and the accessor reads soft-deleted data")]
    SoftDeletedNonSystemKey(String),

    // ==================
    // Option Errors
    // ==================
    /// Limit outside 1..=max
    #[error("limit {limit} must be between 1 and {max}")]
    InvalidLimit { limit: usize, max: usize },

    /// Limit multiplier of zero
    #[error("limit multiplier must be > 0")]
    InvalidLimitMultiplier,

    /// Both StartingAfter and EndingBefore were supplied
    #[error("cannot page both forward and backward")]
    ConflictingBoundaries,

    /// StartingAfter(end) or EndingBefore(begin)
    #[error("cursor '{cursor}' is not valid when paging {direction}")]
    InvalidBoundary { cursor: String, direction: &'static str },

    /// Unknown sort order string
    #[error("invalid sort order '{0}'")]
    InvalidSortOrder(String),

    // ==================
    // Cursor Errors
    // ==================
    /// Cursor failed to decode
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),

    /// Cursor exceeds the configured length bound
    #[error("cursor length {len} exceeds maximum {max}")]
    CursorTooLong { len: usize, max: usize },

    /// A row value cannot be encoded for its key
    #[error("cannot encode value for sort key '{key}': {reason}")]
    Unencodable { key: String, reason: String },
}
