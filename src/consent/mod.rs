//! Purpose consent and retention
//!
//! Every stored column value carries the set of purposes it is consented
//! for. An accessor sees a value only if it is consented for at least one of
//! the accessor's purposes. Soft-deleted values stay readable by
//! soft-deleted accessors until their retention expires.

mod filter;
mod retention;

pub use filter::ConsentFilter;
pub use retention::{InMemoryRetentionStore, RetentionStore};
