//! User store interface

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Column, DataLifeCycleState, UserRecord};
use crate::pagination::{CursorPosition, SortKey};
use crate::selector::BoundSelector;

use super::errors::StorageResult;

/// One ordered range scan
#[derive(Debug, Clone, Copy)]
pub struct ScanQuery<'a> {
    pub selector: &'a BoundSelector,
    /// Sort key tuple, ending with `id`
    pub sort_keys: &'a [SortKey],
    /// Walk the tuple order upwards (true) or downwards (false)
    pub ascending: bool,
    /// Rows must lie strictly past this position in the walk direction
    pub after: &'a CursorPosition,
    pub limit: usize,
    pub state: DataLifeCycleState,
    /// Read from the primary instead of a replica
    pub access_primary_db_only: bool,
}

/// Atomic replacement of one user row
#[derive(Debug, Clone)]
pub struct UserWrite<'a> {
    pub record: UserRecord,
    /// `updated` of the row the new state was derived from
    pub expected_updated: DateTime<Utc>,
    /// Columns whose live values must not be held by any other user
    pub unique_columns: Vec<&'a Column>,
}

/// Access to the `users` table
pub trait UserStore: Send + Sync {
    /// Rows matching the query, in walk order, at most `limit` of them
    fn scan(&self, query: &ScanQuery<'_>) -> StorageResult<Vec<UserRecord>>;

    /// Number of rows in `state` matching `selector`
    fn count(&self, selector: &BoundSelector, state: DataLifeCycleState) -> StorageResult<usize>;

    fn get_user(&self, id: Uuid) -> StorageResult<Option<UserRecord>>;

    /// Ids of live users matching `selector`, ascending
    fn matching_ids(&self, selector: &BoundSelector) -> StorageResult<Vec<Uuid>>;

    fn insert_user(&self, record: UserRecord) -> StorageResult<()>;

    /// Replaces one row if it is unchanged since `expected_updated` and no
    /// unique column conflicts with another user
    fn write_user(&self, write: UserWrite<'_>) -> StorageResult<()>;
}
