//! Userstore data model
//!
//! Describes the objects the execution engine operates on:
//! - Columns (system and custom) with their data types and constraints
//! - Accessors (named read APIs) and Mutators (named write APIs)
//! - User records whose column values carry consented purposes
//!
//! # Invariants
//!
//! 1. Every accessor and mutator declares at least one column
//! 2. System columns (`id`, `organization_id`, `created`, `updated`) are
//!    never nullable and never mutated through a mutator
//! 3. Every stored value carries the set of purposes it was consented for

mod accessor;
mod column;
mod errors;
mod mutator;
mod record;
mod value;

pub use accessor::{Accessor, ColumnOutputConfig, DataLifeCycleState, SelectorConfig};
pub use column::{
    system_column_type, Column, ColumnConstraints, DataType, SYSTEM_COLUMNS,
};
pub use errors::{ModelError, ModelResult};
pub use mutator::{ColumnInputConfig, Mutator};
pub use record::{now_micros, ConsentedValue, UserRecord};
pub use value::{Value, ValueError};
