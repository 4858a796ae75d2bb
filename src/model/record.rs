//! User records and consented values

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::accessor::DataLifeCycleState;
use super::column::Column;
use super::value::Value;

/// Current time truncated to microsecond precision
pub fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// A stored column value together with the purposes it is consented for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentedValue {
    pub value: Value,
    pub purposes: BTreeSet<Uuid>,
    /// Set on soft-deleted values kept for retention
    pub retain_until: Option<DateTime<Utc>>,
}

impl ConsentedValue {
    pub fn new(value: Value, purposes: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            value,
            purposes: purposes.into_iter().collect(),
            retain_until: None,
        }
    }

    /// True if any of `purposes` is consented for this value
    pub fn consented_for_any(&self, purposes: &[Uuid]) -> bool {
        purposes.iter().any(|p| self.purposes.contains(p))
    }

    /// True if a soft-deleted value is still within its retention window
    pub fn is_retained_at(&self, now: DateTime<Utc>) -> bool {
        self.retain_until.map(|until| until > now).unwrap_or(false)
    }
}

/// One row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Live values keyed by column id
    pub live: BTreeMap<Uuid, Vec<ConsentedValue>>,
    /// Soft-deleted values under retention, keyed by column id
    pub soft_deleted: BTreeMap<Uuid, Vec<ConsentedValue>>,
}

impl UserRecord {
    pub fn new(organization_id: Uuid) -> Self {
        let now = now_micros();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            created: now,
            updated: now,
            live: BTreeMap::new(),
            soft_deleted: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets a column to a single value consented for `purposes`
    pub fn with_value(
        mut self,
        column: &Column,
        value: Value,
        purposes: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        let purposes: Vec<Uuid> = purposes.into_iter().collect();
        let entries = match (column.constraints.partial_updates, value) {
            (true, Value::Array(items)) => items
                .into_iter()
                .map(|item| ConsentedValue::new(item, purposes.iter().copied()))
                .collect(),
            (_, value) => vec![ConsentedValue::new(value, purposes)],
        };
        self.live.insert(column.id, entries);
        self
    }

    /// Value of a system column
    pub fn system_value(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::Uuid(self.id)),
            "organization_id" => Some(Value::Uuid(self.organization_id)),
            "created" => Some(Value::Timestamp(self.created)),
            "updated" => Some(Value::Timestamp(self.updated)),
            _ => None,
        }
    }

    /// Stored values of a column in the given lifecycle state
    pub fn column_values(&self, column_id: Uuid, state: DataLifeCycleState) -> &[ConsentedValue] {
        let map = match state {
            DataLifeCycleState::Live => &self.live,
            DataLifeCycleState::SoftDeleted => &self.soft_deleted,
        };
        map.get(&column_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Logical value of a column, ignoring consent.
    ///
    /// Partial-update columns collapse their elements into an array; other
    /// columns yield their single stored value, or null when unset.
    pub fn column_value(&self, column: &Column, state: DataLifeCycleState) -> Value {
        let values = self.column_values(column.id, state);
        if column.constraints.partial_updates {
            return Value::Array(values.iter().map(|v| v.value.clone()).collect());
        }
        values
            .first()
            .map(|v| v.value.clone())
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnConstraints, DataType};

    #[test]
    fn test_consent_intersection() {
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let value = ConsentedValue::new(Value::Int(1), [p1]);
        assert!(value.consented_for_any(&[p2, p1]));
        assert!(!value.consented_for_any(&[p2]));
        assert!(!value.consented_for_any(&[]));
    }

    #[test]
    fn test_partial_column_collapses_to_array() {
        let column = Column::new("tags", DataType::String)
            .array()
            .with_constraints(ColumnConstraints {
                partial_updates: true,
                ..Default::default()
            });
        let purpose = Uuid::new_v4();
        let record = UserRecord::new(Uuid::new_v4()).with_value(
            &column,
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())]),
            [purpose],
        );
        assert_eq!(record.column_values(column.id, DataLifeCycleState::Live).len(), 2);
        assert_eq!(
            record.column_value(&column, DataLifeCycleState::Live),
            Value::Array(vec![Value::String("a".into()), Value::String("b".into())])
        );
    }

    #[test]
    fn test_unset_column_is_null() {
        let column = Column::new("age", DataType::Integer);
        let record = UserRecord::new(Uuid::new_v4());
        assert_eq!(record.column_value(&column, DataLifeCycleState::Live), Value::Null);
        assert_eq!(record.system_value("id"), Some(Value::Uuid(record.id)));
    }
}
