//! Normalization and application of column mutations

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::consent::RetentionStore;
use crate::model::{Column, ConsentedValue, DataLifeCycleState, DataType, UserRecord, Value};

use super::errors::{MutationError, MutationResult};
use super::request::{ColumnChange, ColumnMutation, ElementSet};

/// Normalized elements of a partial update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementChange {
    All,
    Values(Vec<Value>),
}

/// Normalized, typed change to one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedChange {
    KeepCurrent,
    /// Null (or an empty array) removes the value
    Replace(Value),
    Partial {
        additions: Option<ElementChange>,
        deletions: Option<ElementChange>,
    },
}

/// A column mutation ready to apply to user rows
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMutation {
    pub column: Column,
    pub change: PreparedChange,
    pub purpose_additions: BTreeSet<Uuid>,
    pub purpose_deletions: BTreeSet<Uuid>,
}

type Split = (Vec<ConsentedValue>, Vec<ConsentedValue>);

impl ColumnMutation {
    /// Runs request values through `normalize` and parses them against the
    /// column type.
    ///
    /// `normalize` sees each element as text; the column default is used
    /// as declared.
    pub fn prepare<F>(&self, mut normalize: F) -> MutationResult<PreparedMutation>
    where
        F: FnMut(&str) -> MutationResult<String>,
    {
        let column = &self.column;
        let change = match &self.change {
            ColumnChange::KeepCurrent => PreparedChange::KeepCurrent,
            ColumnChange::Default => {
                let value = column
                    .default()
                    .ok_or_else(|| MutationError::NoDefaultValue(column.name.clone()))?;
                PreparedChange::Replace(value)
            }
            ColumnChange::FullReplace(json) => {
                let normalized = match json {
                    Json::Array(items) if column.is_array => Json::Array(
                        items
                            .iter()
                            .map(|item| normalize_element(column, item, &mut normalize))
                            .collect::<MutationResult<_>>()?,
                    ),
                    other => normalize_element(column, other, &mut normalize)?,
                };
                let value = column
                    .parse_value(&normalized)
                    .map_err(|source| MutationError::InvalidValue {
                        column: column.name.clone(),
                        source,
                    })?;
                if let Value::Array(items) = &value {
                    unique_keys(column, items)?;
                }
                PreparedChange::Replace(value)
            }
            ColumnChange::PartialUpdate { additions, deletions } => {
                let mut prepare_set = |set: &Option<ElementSet>| -> MutationResult<Option<ElementChange>> {
                    match set {
                        None => Ok(None),
                        Some(ElementSet::Current) => Ok(Some(ElementChange::All)),
                        Some(ElementSet::Values(items)) => {
                            let mut values = Vec::with_capacity(items.len());
                            for item in items {
                                let normalized = normalize_element(column, item, &mut normalize)?;
                                values.push(column.parse_element(&normalized).map_err(|source| {
                                    MutationError::InvalidValue {
                                        column: column.name.clone(),
                                        source,
                                    }
                                })?);
                            }
                            unique_keys(column, &values)?;
                            Ok(Some(ElementChange::Values(values)))
                        }
                    }
                };
                PreparedChange::Partial {
                    additions: prepare_set(additions)?,
                    deletions: prepare_set(deletions)?,
                }
            }
        };

        Ok(PreparedMutation {
            column: column.clone(),
            change,
            purpose_additions: self.purpose_additions.iter().copied().collect(),
            purpose_deletions: self.purpose_deletions.iter().copied().collect(),
        })
    }
}

fn normalize_element<F>(column: &Column, json: &Json, normalize: &mut F) -> MutationResult<Json>
where
    F: FnMut(&str) -> MutationResult<String>,
{
    let input = match json {
        Json::Null => return Ok(Json::Null),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    };
    let output = normalize(&input)?;
    Ok(match column.data_type {
        DataType::Boolean | DataType::Integer | DataType::Composite => match serde_json::from_str::<Json>(&output) {
            Ok(json) => json,
            Err(_) => Json::String(output),
        },
        _ => Json::String(output),
    })
}

/// Key identifying an element within its array
fn element_key(column: &Column, value: &Value) -> MutationResult<Value> {
    if !column.constraints.unique_id_required {
        return Ok(value.clone());
    }
    match value {
        Value::Composite(fields) => match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Value::String(id.clone())),
            _ => Err(MutationError::UniqueIdRequired {
                column: column.name.clone(),
                reason: "element is missing a non-empty 'id'".into(),
            }),
        },
        other => Err(MutationError::UniqueIdRequired {
            column: column.name.clone(),
            reason: format!("expected composite element, got {}", other.type_name()),
        }),
    }
}

fn unique_keys(column: &Column, values: &[Value]) -> MutationResult<Vec<Value>> {
    let mut keys: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        let key = element_key(column, value)?;
        if keys.contains(&key) {
            let reason = format!("element key {} is not unique", key.to_json());
            return Err(if column.constraints.unique_id_required {
                MutationError::UniqueIdRequired {
                    column: column.name.clone(),
                    reason,
                }
            } else {
                MutationError::invalid(&column.name, reason)
            });
        }
        keys.push(key);
    }
    Ok(keys)
}

fn is_removal(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

impl PreparedMutation {
    fn updated_purposes(&self, current: &BTreeSet<Uuid>) -> BTreeSet<Uuid> {
        current
            .union(&self.purpose_additions)
            .filter(|p| !self.purpose_deletions.contains(p))
            .copied()
            .collect()
    }

    fn immutable(&self) -> MutationError {
        MutationError::ImmutableColumn(self.column.name.clone())
    }

    /// Applies the change to `record`.
    ///
    /// Returns whether the live values changed. Removed values move to the
    /// soft-deleted set when `retention` keeps them.
    pub fn apply(&self, record: &mut UserRecord, retention: &dyn RetentionStore, now: DateTime<Utc>) -> MutationResult<bool> {
        let current = record.column_values(self.column.id, DataLifeCycleState::Live).to_vec();
        let (kept, removed) = match &self.change {
            PreparedChange::Partial { additions, deletions } => {
                self.apply_partial(additions.as_ref(), deletions.as_ref(), current.clone())?
            }
            _ => self.apply_full(current.clone())?,
        };

        let changed = kept != current;
        if kept.is_empty() {
            record.live.remove(&self.column.id);
        } else {
            record.live.insert(self.column.id, kept);
        }

        for value in removed {
            let purposes: Vec<Uuid> = value.purposes.iter().copied().collect();
            if let Some(until) = retention.retain_until(self.column.id, &purposes, now) {
                record
                    .soft_deleted
                    .entry(self.column.id)
                    .or_default()
                    .push(ConsentedValue {
                        retain_until: Some(until),
                        ..value
                    });
            }
        }

        Ok(changed)
    }

    fn apply_full(&self, current: Vec<ConsentedValue>) -> MutationResult<Split> {
        let existing = current.into_iter().next();
        let base = existing.as_ref().map(|cv| cv.purposes.clone()).unwrap_or_default();
        let updated = self.updated_purposes(&base);

        let keep = |cv: ConsentedValue, updated: BTreeSet<Uuid>| -> Split {
            if updated.is_empty() {
                (Vec::new(), vec![cv])
            } else {
                (vec![ConsentedValue { purposes: updated, ..cv }], Vec::new())
            }
        };

        match (&self.change, existing) {
            (PreparedChange::Replace(value), Some(cv)) if cv.value != *value => {
                if self.column.constraints.immutable_required {
                    return Err(self.immutable());
                }
                let mut kept = Vec::new();
                if !is_removal(value) && !updated.is_empty() {
                    kept.push(ConsentedValue::new(value.clone(), updated));
                }
                Ok((kept, vec![cv]))
            }
            (_, Some(cv)) => Ok(keep(cv, updated)),
            (PreparedChange::Replace(value), None) if !is_removal(value) && !updated.is_empty() => {
                Ok((vec![ConsentedValue::new(value.clone(), updated)], Vec::new()))
            }
            (_, None) => Ok((Vec::new(), Vec::new())),
        }
    }

    fn apply_partial(
        &self,
        additions: Option<&ElementChange>,
        deletions: Option<&ElementChange>,
        current: Vec<ConsentedValue>,
    ) -> MutationResult<Split> {
        let column = &self.column;
        let mut pending: Vec<(Value, Value)> = match additions {
            Some(ElementChange::Values(values)) => values
                .iter()
                .map(|v| Ok((element_key(column, v)?, v.clone())))
                .collect::<MutationResult<_>>()?,
            _ => Vec::new(),
        };
        let add_to_all = matches!(additions, Some(ElementChange::All));
        let delete_all = matches!(deletions, Some(ElementChange::All));
        let deleted_keys = match deletions {
            Some(ElementChange::Values(values)) => unique_keys(column, values)?,
            _ => Vec::new(),
        };

        let mut kept = Vec::new();
        let mut removed = Vec::new();

        for cv in current {
            let key = element_key(column, &cv.value)?;
            let mut purposes = cv.purposes.clone();

            if delete_all || deleted_keys.contains(&key) {
                if self.purpose_deletions.is_empty() {
                    purposes.clear();
                } else {
                    purposes.retain(|p| !self.purpose_deletions.contains(p));
                }
            }

            if add_to_all {
                purposes.extend(self.purpose_additions.iter().copied());
            } else if let Some(pos) = pending.iter().position(|(k, _)| *k == key) {
                let (_, value) = pending.remove(pos);
                purposes.extend(self.purpose_additions.iter().copied());
                if value != cv.value {
                    if column.constraints.immutable_required {
                        return Err(self.immutable());
                    }
                    kept.push(ConsentedValue::new(value, purposes));
                    removed.push(cv);
                    continue;
                }
            }

            if purposes.is_empty() {
                removed.push(cv);
            } else {
                kept.push(ConsentedValue { purposes, ..cv });
            }
        }

        for (_, value) in pending {
            kept.push(ConsentedValue::new(value, self.purpose_additions.iter().copied()));
        }

        Ok((kept, removed))
    }
}
