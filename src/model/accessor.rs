//! Accessor definitions

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ModelError, ModelResult};

/// Which retained values an accessor reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLifeCycleState {
    #[default]
    Live,
    SoftDeleted,
}

impl DataLifeCycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLifeCycleState::Live => "live",
            DataLifeCycleState::SoftDeleted => "soft_deleted",
        }
    }
}

/// Parameterized row predicate
///
/// `{column}` placeholders name columns, `?` placeholders are bound to the
/// caller's selector values in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub where_clause: String,
}

impl SelectorConfig {
    pub fn new(where_clause: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
        }
    }

    /// Matches every user
    pub fn all() -> Self {
        Self::new("ALL")
    }
}

/// One output column of an accessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOutputConfig {
    pub column_id: Uuid,
    pub transformer_id: Uuid,
    /// Policy gating tokens minted for this column
    #[serde(default)]
    pub token_access_policy_id: Option<Uuid>,
}

/// A named, policy-governed read API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessor {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: i32,
    pub columns: Vec<ColumnOutputConfig>,
    pub access_policy_id: Uuid,
    /// Overrides the per-column token access policies when set
    #[serde(default)]
    pub token_access_policy_id: Option<Uuid>,
    pub purposes: Vec<Uuid>,
    pub selector_config: SelectorConfig,
    #[serde(default)]
    pub data_life_cycle_state: DataLifeCycleState,
    #[serde(default)]
    pub are_column_access_policies_overridden: bool,
    #[serde(default)]
    pub search_index_id: Option<Uuid>,
}

impl Accessor {
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName("accessor"));
        }
        if self.columns.is_empty() {
            return Err(ModelError::NoColumns("accessor"));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.column_id) {
                return Err(ModelError::DuplicateColumn(column.column_id.to_string()));
            }
        }
        if self.purposes.is_empty() {
            return Err(ModelError::NoPurposes);
        }
        if self.selector_config.where_clause.trim().is_empty() {
            return Err(ModelError::EmptySelector);
        }
        Ok(())
    }
}
