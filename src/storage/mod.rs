//! User record storage
//!
//! The engine reads and writes the `users` table through [`UserStore`].
//! Stores must support:
//!
//! 1. Ordered range scans over a sort key tuple, strictly past a cursor
//!    position, in either direction
//! 2. Atomic single-row writes that check uniqueness constraints and detect
//!    concurrent modification of the same row
//!
//! [`InMemoryUserStore`] is the reference implementation.

mod errors;
mod memory;
mod order;
mod store;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryUserStore;
pub use order::{compare_tuples, sort_tuple};
pub use store::{ScanQuery, UserStore, UserWrite};
