//! Column definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{ModelError, ModelResult};
use super::value::{Value, ValueError};

/// Names of the system columns present on every user record
pub const SYSTEM_COLUMNS: [&str; 4] = ["id", "organization_id", "created", "updated"];

/// Returns the data type of a system column, if `name` is one
pub fn system_column_type(name: &str) -> Option<DataType> {
    match name {
        "id" | "organization_id" => Some(DataType::Uuid),
        "created" | "updated" => Some(DataType::Timestamp),
        _ => None,
    }
}

/// Declared column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Integer,
    String,
    Timestamp,
    Uuid,
    Email,
    Ssn,
    Composite,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::String => "string",
            DataType::Timestamp => "timestamp",
            DataType::Uuid => "uuid",
            DataType::Email => "email",
            DataType::Ssn => "ssn",
            DataType::Composite => "composite",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, DataType::Composite)
    }
}

/// Write-path constraints declared on a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConstraints {
    /// Value may be set once and never changed afterwards
    #[serde(default)]
    pub immutable_required: bool,

    /// Array column updated element by element
    #[serde(default)]
    pub partial_updates: bool,

    /// Every composite element must carry a unique, non-empty `id` field
    #[serde(default)]
    pub unique_id_required: bool,

    /// Value must be unique across all users
    #[serde(default)]
    pub unique_required: bool,
}

/// A custom userstore column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    #[serde(default)]
    pub constraints: ColumnConstraints,
    /// Column-level access policy, composed into every accessor reading it
    #[serde(default)]
    pub access_policy_id: Option<Uuid>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            data_type,
            is_array: false,
            default_value: None,
            constraints: ColumnConstraints::default(),
            access_policy_id: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn with_constraints(mut self, constraints: ColumnConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_default(mut self, default_value: serde_json::Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_access_policy(mut self, policy_id: Uuid) -> Self {
        self.access_policy_id = Some(policy_id);
        self
    }

    /// Parses a JSON value against this column's type
    pub fn parse_value(&self, json: &serde_json::Value) -> Result<Value, ValueError> {
        Value::from_json(self.data_type, self.is_array, json)
    }

    /// Parses a single array element (or the whole value for scalar columns)
    pub fn parse_element(&self, json: &serde_json::Value) -> Result<Value, ValueError> {
        Value::scalar_from_json(self.data_type, json)
    }

    /// The parsed default value, if one is declared
    pub fn default(&self) -> Option<Value> {
        self.default_value
            .as_ref()
            .and_then(|json| self.parse_value(json).ok())
    }

    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |reason: &str| ModelError::InvalidColumn {
            column: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName("column"));
        }
        if system_column_type(&self.name).is_some() {
            return Err(invalid("name collides with a system column"));
        }
        if self.constraints.partial_updates && !self.is_array {
            return Err(invalid("partial updates require an array column"));
        }
        if self.constraints.unique_id_required
            && !(self.is_array && self.data_type.is_composite())
        {
            return Err(invalid("unique id constraint requires an array of composites"));
        }
        if let Some(json) = &self.default_value {
            self.parse_value(json)
                .map_err(|e| invalid(&format!("bad default value: {}", e)))?;
        }
        Ok(())
    }
}
