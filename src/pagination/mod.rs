//! Cursor-based pagination
//!
//! Bidirectional, multi-key pagination over a totally ordered candidate set.
//!
//! # Principles
//!
//! 1. Sort keys always end with `id`, so the order is total
//! 2. A cursor holds one row's value for every active sort key
//! 3. Page boundaries are computed from the candidate window, never from the
//!    rows that survive policy filtering
//! 4. Forward and backward traversal are inverses of each other
//!
//! # Cursor format
//!
//! ```text
//! name:bar,boolean:false,id:9f5c...e1
//! ```
//!
//! The empty cursor marks the beginning of the set and `end` marks its end.

mod cursor;
mod errors;
mod keys;
mod options;
mod window;

pub use cursor::{Cursor, CursorCodec, CursorPosition, CURSOR_BEGIN, CURSOR_END};
pub use errors::{PaginationError, PaginationResult};
pub use keys::{parse_sort_key_list, KeySource, KeyType, SortKey, SortKeyValidator};
pub use options::{Direction, PageBounds, PaginationOptions, Paginator, SortOrder};
pub use window::{WindowSelection, Windower};
