//! Consent filtering of stored values

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Column, ConsentedValue, DataLifeCycleState, UserRecord, Value};

/// Filters column values down to those consented for a set of purposes
#[derive(Debug, Clone, Copy)]
pub struct ConsentFilter<'a> {
    purposes: &'a [Uuid],
    state: DataLifeCycleState,
    now: DateTime<Utc>,
}

impl<'a> ConsentFilter<'a> {
    pub fn new(purposes: &'a [Uuid], state: DataLifeCycleState, now: DateTime<Utc>) -> Self {
        Self { purposes, state, now }
    }

    fn admits(&self, value: &ConsentedValue) -> bool {
        if !value.consented_for_any(self.purposes) {
            return false;
        }
        match self.state {
            DataLifeCycleState::Live => true,
            DataLifeCycleState::SoftDeleted => value.is_retained_at(self.now),
        }
    }

    /// Stored values of `column` visible under this filter
    pub fn values<'r>(&self, record: &'r UserRecord, column: &Column) -> Vec<&'r ConsentedValue> {
        record
            .column_values(column.id, self.state)
            .iter()
            .filter(|v| self.admits(v))
            .collect()
    }

    /// Visible logical value of `column`, or `None` if nothing survives.
    ///
    /// Partial-update columns yield the array of surviving elements.
    pub fn value(&self, record: &UserRecord, column: &Column) -> Option<Value> {
        let values = self.values(record, column);
        if values.is_empty() {
            return None;
        }
        if column.constraints.partial_updates {
            return Some(Value::Array(values.into_iter().map(|v| v.value.clone()).collect()));
        }
        values.first().map(|v| v.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{now_micros, ColumnConstraints, DataType};
    use chrono::Duration;

    #[test]
    fn test_live_values_need_matching_purpose() {
        let (marketing, support) = (Uuid::new_v4(), Uuid::new_v4());
        let column = Column::new("email", DataType::String);
        let record = UserRecord::new(Uuid::nil()).with_value(&column, Value::String("a@b.c".into()), [marketing]);
        let now = now_micros();

        let allowed = [support, marketing];
        assert_eq!(
            ConsentFilter::new(&allowed, DataLifeCycleState::Live, now).value(&record, &column),
            Some(Value::String("a@b.c".into()))
        );
        let denied = [support];
        assert_eq!(ConsentFilter::new(&denied, DataLifeCycleState::Live, now).value(&record, &column), None);
    }

    #[test]
    fn test_partial_update_elements_filtered_individually() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let column = Column::new("tags", DataType::String).array().with_constraints(ColumnConstraints {
            partial_updates: true,
            ..Default::default()
        });
        let mut record = UserRecord::new(Uuid::nil());
        record.live.insert(
            column.id,
            vec![
                ConsentedValue::new(Value::String("a".into()), [p1]),
                ConsentedValue::new(Value::String("b".into()), [p2]),
            ],
        );

        let purposes = [p2];
        assert_eq!(
            ConsentFilter::new(&purposes, DataLifeCycleState::Live, now_micros()).value(&record, &column),
            Some(Value::Array(vec![Value::String("b".into())]))
        );
    }

    #[test]
    fn test_soft_deleted_values_expire() {
        let purpose = Uuid::new_v4();
        let column = Column::new("name", DataType::String);
        let now = now_micros();
        let mut record = UserRecord::new(Uuid::nil());
        let mut retained = ConsentedValue::new(Value::String("old".into()), [purpose]);
        retained.retain_until = Some(now + Duration::days(1));
        record.soft_deleted.insert(column.id, vec![retained]);

        let purposes = [purpose];
        let filter = ConsentFilter::new(&purposes, DataLifeCycleState::SoftDeleted, now);
        assert_eq!(filter.value(&record, &column), Some(Value::String("old".into())));

        let later = ConsentFilter::new(&purposes, DataLifeCycleState::SoftDeleted, now + Duration::days(2));
        assert_eq!(later.value(&record, &column), None);
    }
}
