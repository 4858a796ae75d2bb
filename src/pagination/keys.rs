//! Sort key validation and resolution

use std::collections::HashSet;

use crate::model::{
    system_column_type, Column, DataLifeCycleState, DataType, UserRecord, Value,
};

use super::errors::{PaginationError, PaginationResult};

/// Scalar type of a sort key, which fixes how cursor values are parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Boolean,
    Integer,
    String,
    Timestamp,
    Uuid,
}

impl KeyType {
    fn from_data_type(data_type: DataType) -> Option<Self> {
        match data_type {
            DataType::Boolean => Some(KeyType::Boolean),
            DataType::Integer => Some(KeyType::Integer),
            DataType::String | DataType::Email | DataType::Ssn => Some(KeyType::String),
            DataType::Timestamp => Some(KeyType::Timestamp),
            DataType::Uuid => Some(KeyType::Uuid),
            DataType::Composite => None,
        }
    }
}

/// Where a sort key's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    System,
    Column(uuid::Uuid),
}

/// A resolved sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub name: String,
    pub source: KeySource,
    pub key_type: KeyType,
    /// System keys are never null; custom columns may be
    pub nullable: bool,
}

impl SortKey {
    /// The `id` key that terminates every sort key list
    pub fn id() -> Self {
        Self {
            name: "id".to_string(),
            source: KeySource::System,
            key_type: KeyType::Uuid,
            nullable: false,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self.source, KeySource::System)
    }

    /// Extracts this key's value from a record
    pub fn value_of(&self, record: &UserRecord, state: DataLifeCycleState) -> Value {
        match self.source {
            KeySource::System => record.system_value(&self.name).unwrap_or(Value::Null),
            KeySource::Column(column_id) => record
                .column_values(column_id, state)
                .first()
                .map(|v| v.value.clone())
                .unwrap_or(Value::Null),
        }
    }
}

/// Splits a comma-joined sort key string
pub fn parse_sort_key_list(keys: &str) -> Vec<String> {
    if keys.trim().is_empty() {
        return Vec::new();
    }
    keys.split(',').map(|k| k.trim().to_string()).collect()
}

/// Validates requested sort keys against an accessor or mutator
///
/// Eligible keys are the system keys plus the columns the object actually
/// exposes. Objects reading soft-deleted data may only sort by system keys.
pub struct SortKeyValidator<'a> {
    columns: &'a [Column],
    state: DataLifeCycleState,
}

impl<'a> SortKeyValidator<'a> {
    pub fn new(columns: &'a [Column], state: DataLifeCycleState) -> Self {
        Self { columns, state }
    }

    /// Validates `requested` and resolves it into sort keys.
    ///
    /// Checks run in a fixed order: emptiness, `id` placement and duplicates,
    /// resolvability, type eligibility, lifecycle restrictions.
    pub fn validate(&self, requested: &[String]) -> PaginationResult<Vec<SortKey>> {
        if requested.is_empty() {
            return Err(PaginationError::EmptySortKey);
        }
        if requested.iter().any(|k| k.is_empty()) {
            return Err(PaginationError::EmptySortKeyName);
        }

        let id_positions = requested.iter().filter(|k| k.as_str() == "id").count();
        if requested.last().map(String::as_str) != Some("id") || id_positions != 1 {
            return Err(PaginationError::IdNotLast);
        }

        let mut seen = HashSet::new();
        for key in requested {
            if !seen.insert(key.as_str()) {
                return Err(PaginationError::DuplicateSortKey(key.clone()));
            }
        }

        let mut resolved = Vec::with_capacity(requested.len());
        for key in requested {
            resolved.push(self.resolve(key)?);
        }

        for (key, (_, column)) in requested.iter().zip(&resolved) {
            if let Some(column) = column {
                if column.is_array {
                    return Err(PaginationError::UnsortableKeyType {
                        key: key.clone(),
                        reason: "array columns cannot be sorted",
                    });
                }
                if column.data_type.is_composite() {
                    return Err(PaginationError::UnsortableKeyType {
                        key: key.clone(),
                        reason: "composite columns cannot be sorted",
                    });
                }
            }
        }

        if self.state == DataLifeCycleState::SoftDeleted {
            if let Some((key, _)) = requested
                .iter()
                .zip(&resolved)
                .find(|(_, (_, column))| column.is_some())
            {
                return Err(PaginationError::SoftDeletedNonSystemKey(key.clone()));
            }
        }

        resolved
            .into_iter()
            .zip(requested)
            .map(|((data_type, column), name)| {
                let key_type = KeyType::from_data_type(data_type).ok_or_else(|| {
                    PaginationError::UnsortableKeyType {
                        key: name.clone(),
                        reason: "composite columns cannot be sorted",
                    }
                })?;
                Ok(SortKey {
                    name: name.clone(),
                    source: column
                        .map(|c| KeySource::Column(c.id))
                        .unwrap_or(KeySource::System),
                    key_type,
                    nullable: column.is_some(),
                })
            })
            .collect()
    }

    fn resolve(&self, key: &str) -> PaginationResult<(DataType, Option<&'a Column>)> {
        if let Some(data_type) = system_column_type(key) {
            return Ok((data_type, None));
        }
        self.columns
            .iter()
            .find(|c| c.name == key)
            .map(|c| (c.data_type, Some(c)))
            .ok_or_else(|| PaginationError::UnsupportedSortKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("name", DataType::String),
            Column::new("age", DataType::Integer),
            Column::new("tags", DataType::String).array(),
            Column::new("address", DataType::Composite),
        ]
    }

    fn keys(list: &str) -> Vec<String> {
        parse_sort_key_list(list)
    }

    #[test]
    fn test_valid_multi_key() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::Live);
        let resolved = validator.validate(&keys("name,age,created,id")).unwrap();

        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[0].key_type, KeyType::String);
        assert!(resolved[0].nullable);
        assert!(resolved[2].is_system());
        assert!(!resolved[3].nullable);
    }

    #[test]
    fn test_rejects_empty() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::Live);
        assert_eq!(validator.validate(&[]), Err(PaginationError::EmptySortKey));
        assert_eq!(
            validator.validate(&keys("name,,id")),
            Err(PaginationError::EmptySortKeyName)
        );
    }

    #[test]
    fn test_id_must_be_last() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::Live);
        assert_eq!(validator.validate(&keys("name")), Err(PaginationError::IdNotLast));
        assert_eq!(validator.validate(&keys("id,name")), Err(PaginationError::IdNotLast));
        assert_eq!(validator.validate(&keys("id,name,id")), Err(PaginationError::IdNotLast));
    }

    #[test]
    fn test_rejects_duplicates() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::Live);
        assert_eq!(
            validator.validate(&keys("name,name,id")),
            Err(PaginationError::DuplicateSortKey("name".to_string()))
        );
    }

    #[test]
    fn test_rejects_unknown_and_unsortable() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::Live);
        assert_eq!(
            validator.validate(&keys("email,id")),
            Err(PaginationError::UnsupportedSortKey("email".to_string()))
        );
        assert!(matches!(
            validator.validate(&keys("tags,id")),
            Err(PaginationError::UnsortableKeyType { .. })
        ));
        assert!(matches!(
            validator.validate(&keys("address,id")),
            Err(PaginationError::UnsortableKeyType { .. })
        ));
    }

    #[test]
    fn test_soft_deleted_allows_only_system_keys() {
        let cols = columns();
        let validator = SortKeyValidator::new(&cols, DataLifeCycleState::SoftDeleted);
        assert!(validator.validate(&keys("created,organization_id,id")).is_ok());
        assert_eq!(
            validator.validate(&keys("name,id")),
            Err(PaginationError::SoftDeletedNonSystemKey("name".to_string()))
        );
    }
}
