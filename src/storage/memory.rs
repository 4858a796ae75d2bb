//! In-memory user store

use std::collections::BTreeMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::model::{DataLifeCycleState, UserRecord};
use crate::pagination::CursorPosition;
use crate::selector::BoundSelector;

use super::errors::{StorageError, StorageResult};
use super::order::{compare_tuples, sort_tuple};
use super::store::{ScanQuery, UserStore, UserWrite};

/// User store backed by an ordered map
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<Uuid, UserRecord>>,
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("lock poisoned".into())
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`
    pub fn with_users(records: impl IntoIterator<Item = UserRecord>) -> StorageResult<Self> {
        let store = Self::new();
        for record in records {
            store.insert_user(record)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn in_state(record: &UserRecord, state: DataLifeCycleState) -> bool {
        match state {
            DataLifeCycleState::Live => true,
            DataLifeCycleState::SoftDeleted => record.soft_deleted.values().any(|v| !v.is_empty()),
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn scan(&self, query: &ScanQuery<'_>) -> StorageResult<Vec<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;

        let mut rows: Vec<(Vec<_>, &UserRecord)> = users
            .values()
            .filter(|record| Self::in_state(record, query.state))
            .filter(|record| query.selector.matches(record, query.state))
            .map(|record| (sort_tuple(query.sort_keys, record, query.state), record))
            .filter(|(tuple, _)| match query.after {
                CursorPosition::Unbounded => true,
                CursorPosition::At(position) => {
                    let ordering = compare_tuples(tuple, position);
                    if query.ascending {
                        ordering.is_gt()
                    } else {
                        ordering.is_lt()
                    }
                }
            })
            .collect();

        rows.sort_by(|(a, _), (b, _)| {
            let ordering = compare_tuples(a, b);
            if query.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        Ok(rows
            .into_iter()
            .take(query.limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn count(&self, selector: &BoundSelector, state: DataLifeCycleState) -> StorageResult<usize> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .filter(|record| Self::in_state(record, state))
            .filter(|record| selector.matches(record, state))
            .count())
    }

    fn get_user(&self, id: Uuid) -> StorageResult<Option<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    fn matching_ids(&self, selector: &BoundSelector) -> StorageResult<Vec<Uuid>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .filter(|record| selector.matches(record, DataLifeCycleState::Live))
            .map(|record| record.id)
            .collect())
    }

    fn insert_user(&self, record: UserRecord) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        if users.contains_key(&record.id) {
            return Err(StorageError::DuplicateUser(record.id));
        }
        users.insert(record.id, record);
        Ok(())
    }

    fn write_user(&self, write: UserWrite<'_>) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        let id = write.record.id;

        match users.get(&id) {
            None => return Err(StorageError::UserNotFound(id)),
            Some(current) if current.updated != write.expected_updated => {
                return Err(StorageError::ConcurrentModification(id))
            }
            Some(_) => {}
        }

        for column in &write.unique_columns {
            for candidate in write.record.column_values(column.id, DataLifeCycleState::Live) {
                let taken = users.values().filter(|other| other.id != id).any(|other| {
                    other
                        .column_values(column.id, DataLifeCycleState::Live)
                        .iter()
                        .any(|v| v.value == candidate.value)
                });
                if taken {
                    return Err(StorageError::UniqueViolation {
                        column: column.name.clone(),
                        value: candidate.value.to_json().to_string(),
                    });
                }
            }
        }

        users.insert(id, write.record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Column, ColumnConstraints, DataType, Value};
    use crate::pagination::{SortKeyValidator, SortKey};

    fn fixture() -> (Column, InMemoryUserStore, Vec<Uuid>) {
        let column = Column::new("name", DataType::String).with_constraints(ColumnConstraints {
            unique_required: true,
            ..Default::default()
        });
        let purpose = Uuid::new_v4();
        let org = Uuid::new_v4();
        let mut ids = Vec::new();
        let mut records = Vec::new();
        for (i, name) in ["carol", "alice", "bob", "alice2"].iter().enumerate() {
            let id = Uuid::from_u128(i as u128 + 1);
            ids.push(id);
            records.push(
                UserRecord::new(org)
                    .with_id(id)
                    .with_value(&column, Value::String(name.to_string()), [purpose]),
            );
        }
        (column.clone(), InMemoryUserStore::with_users(records).unwrap(), ids)
    }

    fn keys(column: &Column) -> Vec<SortKey> {
        SortKeyValidator::new(std::slice::from_ref(column), DataLifeCycleState::Live)
            .validate(&["name".to_string(), "id".to_string()])
            .unwrap()
    }

    fn names(rows: &[UserRecord], column: &Column) -> Vec<String> {
        rows.iter()
            .map(|r| r.column_value(column, DataLifeCycleState::Live).to_text())
            .collect()
    }

    #[test]
    fn test_scan_orders_and_bounds() {
        let (column, store, _) = fixture();
        let keys = keys(&column);
        let all = BoundSelector::all();
        let unbounded = CursorPosition::Unbounded;

        let query = ScanQuery {
            selector: &all,
            sort_keys: &keys,
            ascending: true,
            after: &unbounded,
            limit: 10,
            state: DataLifeCycleState::Live,
            access_primary_db_only: false,
        };
        let rows = store.scan(&query).unwrap();
        assert_eq!(names(&rows, &column), vec!["alice", "alice2", "bob", "carol"]);

        let position = CursorPosition::At(sort_tuple(&keys, &rows[1], DataLifeCycleState::Live));
        let after = store
            .scan(&ScanQuery {
                after: &position,
                limit: 1,
                ..query
            })
            .unwrap();
        assert_eq!(names(&after, &column), vec!["bob"]);

        let before = store
            .scan(&ScanQuery {
                after: &position,
                ascending: false,
                ..query
            })
            .unwrap();
        assert_eq!(names(&before, &column), vec!["alice"]);
    }

    #[test]
    fn test_write_checks_uniqueness_and_staleness() {
        let (column, store, ids) = fixture();
        let current = store.get_user(ids[0]).unwrap().unwrap();

        let mut clash = current.clone();
        clash.live.get_mut(&column.id).unwrap()[0].value = Value::String("bob".into());
        let err = store
            .write_user(UserWrite {
                record: clash,
                expected_updated: current.updated,
                unique_columns: vec![&column],
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));

        let mut renamed = current.clone();
        renamed.live.get_mut(&column.id).unwrap()[0].value = Value::String("dave".into());
        renamed.updated = current.updated + chrono::Duration::seconds(1);
        store
            .write_user(UserWrite {
                record: renamed.clone(),
                expected_updated: current.updated,
                unique_columns: vec![&column],
            })
            .unwrap();

        let stale = store.write_user(UserWrite {
            record: renamed,
            expected_updated: current.updated,
            unique_columns: vec![],
        });
        assert_eq!(stale, Err(StorageError::ConcurrentModification(ids[0])));
    }

    #[test]
    fn test_count_matches_scan() {
        let (_, store, _) = fixture();
        assert_eq!(store.count(&BoundSelector::all(), DataLifeCycleState::Live).unwrap(), 4);
        assert_eq!(store.count(&BoundSelector::all(), DataLifeCycleState::SoftDeleted).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (_, store, ids) = fixture();
        let duplicate = UserRecord::new(Uuid::new_v4()).with_id(ids[0]);
        assert_eq!(store.insert_user(duplicate), Err(StorageError::DuplicateUser(ids[0])));
    }
}
