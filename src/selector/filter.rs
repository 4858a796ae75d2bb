//! Evaluates bound selectors against user records

use std::cmp::Ordering;

use crate::model::{DataLifeCycleState, UserRecord, Value};

use super::binder::{BoundColumn, BoundOperand, BoundPredicate, BoundSelector};
use super::parser::CompareOp;

impl BoundSelector {
    /// True if `record` satisfies the selector
    pub fn matches(&self, record: &UserRecord, state: DataLifeCycleState) -> bool {
        evaluate(&self.predicate, record, state)
    }
}

fn evaluate(predicate: &BoundPredicate, record: &UserRecord, state: DataLifeCycleState) -> bool {
    match predicate {
        BoundPredicate::All => true,
        BoundPredicate::And(left, right) => {
            evaluate(left, record, state) && evaluate(right, record, state)
        }
        BoundPredicate::Or(left, right) => {
            evaluate(left, record, state) || evaluate(right, record, state)
        }
        BoundPredicate::Not(inner) => !evaluate(inner, record, state),
        BoundPredicate::IsNull { column, negated } => {
            let is_null = match column_value(column, record, state) {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                _ => false,
            };
            is_null != *negated
        }
        BoundPredicate::Compare { column, op, operand } => match column_value(column, record, state) {
            Value::Null => false,
            Value::Array(items) if column.field.is_none() => {
                items.iter().any(|item| compare(item, *op, operand))
            }
            value => compare(&value, *op, operand),
        },
    }
}

fn column_value(column: &BoundColumn, record: &UserRecord, state: DataLifeCycleState) -> Value {
    let value = match &column.column {
        Some(c) => record.column_value(c, state),
        None => record.system_value(&column.name).unwrap_or(Value::Null),
    };

    match (&column.field, value) {
        (None, value) => value,
        (Some(field), Value::Composite(fields)) => match fields.get(field) {
            None | Some(Value::Null) => Value::Null,
            Some(v) => Value::String(v.to_text()),
        },
        (Some(_), _) => Value::Null,
    }
}

fn compare(value: &Value, op: CompareOp, operand: &BoundOperand) -> bool {
    if value.is_null() {
        return false;
    }
    match operand {
        BoundOperand::Pattern(re) => re.is_match(&value.to_text()),
        BoundOperand::Values(candidates) => candidates
            .iter()
            .any(|c| !c.is_null() && value.compare(c) == Ordering::Equal),
        BoundOperand::Value(bound) => {
            if bound.is_null() {
                return false;
            }
            let ord = value.compare(bound);
            match op {
                CompareOp::Eq => ord == Ordering::Equal,
                CompareOp::NotEq => ord != Ordering::Equal,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Lte => ord != Ordering::Greater,
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Gte => ord != Ordering::Less,
                CompareOp::Like | CompareOp::ILike => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Column, ColumnConstraints, DataType, SelectorConfig, UserRecord, Value};
    use crate::selector::SelectorBinder;
    use crate::model::DataLifeCycleState::Live;
    use serde_json::json;
    use uuid::Uuid;

    struct Fixture {
        columns: Vec<Column>,
        purpose: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                columns: vec![
                    Column::new("email", DataType::Email),
                    Column::new("age", DataType::Integer),
                    Column::new("tags", DataType::String)
                        .array()
                        .with_constraints(ColumnConstraints {
                            partial_updates: true,
                            ..Default::default()
                        }),
                    Column::new("address", DataType::Composite),
                ],
                purpose: Uuid::new_v4(),
            }
        }

        fn user(&self, email: &str, age: Option<i64>) -> UserRecord {
            let mut record = UserRecord::new(Uuid::new_v4()).with_value(
                &self.columns[0],
                Value::String(email.to_string()),
                [self.purpose],
            );
            if let Some(age) = age {
                record = record.with_value(&self.columns[1], Value::Int(age), [self.purpose]);
            }
            record
        }

        fn matches(&self, clause: &str, values: &[serde_json::Value], record: &UserRecord) -> bool {
            SelectorBinder::new(&self.columns)
                .bind(&SelectorConfig::new(clause), values)
                .unwrap()
                .matches(record, Live)
        }
    }

    #[test]
    fn test_id_any() {
        let f = Fixture::new();
        let user = f.user("a@b.co", None);
        let other = Uuid::new_v4().to_string();
        assert!(f.matches("{id} = ANY (?)", &[json!([other, user.id.to_string()])], &user));
        assert!(!f.matches("{id} = ANY (?)", &[json!([other])], &user));
    }

    #[test]
    fn test_comparisons_and_null_semantics() {
        let f = Fixture::new();
        let adult = f.user("a@b.co", Some(40));
        let unknown = f.user("c@d.co", None);

        assert!(f.matches("{age} >= ?", &[json!(18)], &adult));
        assert!(!f.matches("{age} < ?", &[json!(18)], &adult));
        assert!(!f.matches("{age} != ?", &[json!(18)], &unknown));
        assert!(f.matches("{age} IS NULL", &[], &unknown));
        assert!(f.matches("{age} IS NOT NULL", &[], &adult));
    }

    #[test]
    fn test_like_and_ilike() {
        let f = Fixture::new();
        let user = f.user("Jane@Example.com", None);
        assert!(f.matches("{email} LIKE ?", &[json!("Jane@%")], &user));
        assert!(!f.matches("{email} LIKE ?", &[json!("jane@%")], &user));
        assert!(f.matches("{email} ILIKE ?", &[json!("jane@%")], &user));
    }

    #[test]
    fn test_boolean_composition() {
        let f = Fixture::new();
        let user = f.user("a@b.co", Some(30));
        assert!(f.matches("{age} = ? OR {email} = ?", &[json!(1), json!("a@b.co")], &user));
        assert!(!f.matches("{age} = ? AND {email} = ?", &[json!(1), json!("a@b.co")], &user));
        assert!(f.matches("NOT ({age} = ?)", &[json!(1)], &user));
        assert!(f.matches("ALL", &[], &user));
    }

    #[test]
    fn test_array_column_matches_any_element() {
        let f = Fixture::new();
        let user = f.user("a@b.co", None).with_value(
            &f.columns[2],
            Value::Array(vec![Value::String("red".into()), Value::String("blue".into())]),
            [f.purpose],
        );
        assert!(f.matches("{tags} = ?", &[json!("blue")], &user));
        assert!(!f.matches("{tags} = ?", &[json!("green")], &user));
    }

    #[test]
    fn test_composite_field_access() {
        let f = Fixture::new();
        let user = f.user("a@b.co", None).with_value(
            &f.columns[3],
            Value::from_json(DataType::Composite, false, &json!({"city": "Oslo"})).unwrap(),
            [f.purpose],
        );
        assert!(f.matches("{address}->>'city' = ?", &[json!("Oslo")], &user));
        assert!(!f.matches("{address}->>'zip' = ?", &[json!("Oslo")], &user));
    }
}
