//! Sort key tuple ordering
//!
//! Tuples compare key by key using [`Value::compare`] (nulls first). A
//! descending order is the exact reverse of the ascending one, `id`
//! included.

use std::cmp::Ordering;

use crate::model::{DataLifeCycleState, UserRecord, Value};
use crate::pagination::SortKey;

/// Extracts the sort key tuple of `record`
pub fn sort_tuple(keys: &[SortKey], record: &UserRecord, state: DataLifeCycleState) -> Vec<Value> {
    keys.iter().map(|key| key.value_of(record, state)).collect()
}

/// Ascending comparison of two sort key tuples
pub fn compare_tuples(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = x.compare(y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_nulls_first() {
        let id = Value::Uuid(Uuid::nil());
        assert_eq!(
            compare_tuples(&[Value::Null, id.clone()], &[Value::Int(-5), id.clone()]),
            Ordering::Less
        );
    }

    #[test]
    fn test_id_breaks_ties() {
        let low = Value::Uuid(Uuid::from_u128(1));
        let high = Value::Uuid(Uuid::from_u128(2));
        let name = Value::String("same".into());
        assert_eq!(
            compare_tuples(&[name.clone(), low], &[name, high]),
            Ordering::Less
        );
    }

    #[test]
    fn test_leading_key_dominates() {
        let a = [Value::String("a".into()), Value::Uuid(Uuid::from_u128(9))];
        let b = [Value::String("b".into()), Value::Uuid(Uuid::from_u128(1))];
        assert_eq!(compare_tuples(&a, &b), Ordering::Less);
        assert_eq!(compare_tuples(&b, &a), Ordering::Greater);
    }
}
