//! Object catalog
//!
//! Definitions the engine looks up by id on every invocation: columns,
//! purposes, accessors, mutators, transformers and access policies.
//! Policies are stored once and referenced by id, so a policy edit applies
//! to every accessor and mutator referencing it from the next call on.

mod errors;
mod memory;

pub use errors::{CatalogError, CatalogResult};
pub use memory::InMemoryCatalog;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Accessor, Column, Mutator};
use crate::policy::PolicySource;
use crate::transform::Transformer;

/// A consent purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purpose {
    pub id: Uuid,
    pub name: String,
}

impl Purpose {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Read access to stored definitions
pub trait Catalog: Send + Sync {
    fn accessor(&self, id: Uuid) -> Option<Accessor>;

    fn mutator(&self, id: Uuid) -> Option<Mutator>;

    fn column(&self, id: Uuid) -> Option<Column>;

    /// Every custom column, for binding selectors
    fn columns(&self) -> Vec<Column>;

    fn transformer(&self, id: Uuid) -> Option<Transformer>;

    fn purpose(&self, id: Uuid) -> Option<Purpose>;

    /// Policy ANDed into every accessor execution
    fn global_accessor_policy_id(&self) -> Option<Uuid>;

    /// Policy ANDed into every mutator execution
    fn global_mutator_policy_id(&self) -> Option<Uuid>;

    /// Access policies and templates
    fn policies(&self) -> &dyn PolicySource;
}
