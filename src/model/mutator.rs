//! Mutator definitions

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accessor::SelectorConfig;
use super::errors::{ModelError, ModelResult};

/// One input column of a mutator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInputConfig {
    pub column_id: Uuid,
    pub normalizer_id: Uuid,
}

/// A named, policy-governed write API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutator {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: i32,
    pub columns: Vec<ColumnInputConfig>,
    pub access_policy_id: Uuid,
    pub selector_config: SelectorConfig,
}

impl Mutator {
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName("mutator"));
        }
        if self.columns.is_empty() {
            return Err(ModelError::NoColumns("mutator"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.column_id) {
                return Err(ModelError::DuplicateColumn(column.column_id.to_string()));
            }
        }
        if self.selector_config.where_clause.trim().is_empty() {
            return Err(ModelError::EmptySelector);
        }
        Ok(())
    }
}
