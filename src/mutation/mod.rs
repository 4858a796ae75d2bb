//! Mutator row changes
//!
//! A mutator request carries, per column, either a full replacement value or
//! a partial update (element additions and deletions), plus purpose
//! additions and deletions. Requests are parsed and validated once per
//! invocation, normalized, then applied to each selected user row.
//!
//! # Rules
//!
//! 1. The request names exactly the mutator's columns
//! 2. Full replacement: purposes become `current ∪ additions − deletions`;
//!    a value left without purposes is removed
//! 3. Partial updates are only valid for `partial_updates` columns, and
//!    every element carries its own purposes
//! 4. Removed values whose purposes carry a retention duration move to the
//!    soft-deleted set until they expire
//! 5. Immutable columns can be set once

mod apply;
mod errors;
mod request;

pub use apply::{ElementChange, PreparedChange, PreparedMutation};
pub use errors::{MutationError, MutationResult};
pub use request::{
    parse_row_data, ColumnChange, ColumnMutation, ElementSet, ValueAndPurposes,
    MUTATOR_COLUMN_CURRENT_VALUE, MUTATOR_COLUMN_DEFAULT_VALUE,
};
