//! Mutator request parsing and validation

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::model::Column;

use super::errors::{MutationError, MutationResult};

/// Value placeholder: set the column to its declared default
pub const MUTATOR_COLUMN_DEFAULT_VALUE: &str = "UCDEF-7f55f479-3822-4976-a8a9-b789d5c6f152";

/// Value placeholder: keep the current value, change purposes only
pub const MUTATOR_COLUMN_CURRENT_VALUE: &str = "UCCUR-7f55f479-3822-4976-a8a9-b789d5c6f152";

/// Per-column request body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueAndPurposes {
    #[serde(default)]
    pub value: Option<Json>,
    #[serde(default)]
    pub value_additions: Option<Json>,
    #[serde(default)]
    pub value_deletions: Option<Json>,
    #[serde(default)]
    pub purpose_additions: Vec<Uuid>,
    #[serde(default)]
    pub purpose_deletions: Vec<Uuid>,
}

/// Elements named by a partial update
#[derive(Debug, Clone, PartialEq)]
pub enum ElementSet {
    /// Every current element
    Current,
    Values(Vec<Json>),
}

impl ElementSet {
    fn parse(column: &Column, field: &str, json: &Json) -> MutationResult<Self> {
        match json {
            Json::String(s) if s == MUTATOR_COLUMN_CURRENT_VALUE => Ok(ElementSet::Current),
            Json::Array(items) => Ok(ElementSet::Values(items.clone())),
            _ => Err(MutationError::invalid(
                &column.name,
                format!("{} must be an array", field),
            )),
        }
    }
}

/// What a request does to one column's value
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    /// Keep the value, adjust purposes
    KeepCurrent,
    /// Replace with the column's default
    Default,
    FullReplace(Json),
    PartialUpdate {
        additions: Option<ElementSet>,
        deletions: Option<ElementSet>,
    },
}

/// A validated change to one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMutation {
    pub column: Column,
    pub change: ColumnChange,
    pub purpose_additions: Vec<Uuid>,
    pub purpose_deletions: Vec<Uuid>,
}

fn has_duplicates(ids: &[Uuid]) -> bool {
    let mut seen = HashSet::new();
    ids.iter().any(|id| !seen.insert(*id))
}

impl ColumnMutation {
    /// Validates `request` against `column` and classifies it
    pub fn from_request(column: Column, request: ValueAndPurposes) -> MutationResult<Self> {
        let name = column.name.as_str();

        if has_duplicates(&request.purpose_additions) {
            return Err(MutationError::invalid(name, "has duplicate purpose additions"));
        }
        if has_duplicates(&request.purpose_deletions) {
            return Err(MutationError::invalid(name, "has duplicate purpose deletions"));
        }

        let change = if column.constraints.partial_updates {
            if request.value.is_some() {
                return Err(MutationError::invalid(
                    name,
                    "must use value_additions or value_deletions on a partial update column",
                ));
            }

            let additions = request
                .value_additions
                .as_ref()
                .map(|json| ElementSet::parse(&column, "value_additions", json))
                .transpose()?;
            let deletions = request
                .value_deletions
                .as_ref()
                .map(|json| ElementSet::parse(&column, "value_deletions", json))
                .transpose()?;

            match &additions {
                Some(ElementSet::Values(_)) if request.purpose_additions.is_empty() => {
                    return Err(MutationError::invalid(name, "has value addition with no purpose additions"))
                }
                None if !request.purpose_additions.is_empty() => {
                    return Err(MutationError::invalid(name, "has purpose additions with no value addition"))
                }
                _ => {}
            }
            if deletions.is_none() && !request.purpose_deletions.is_empty() {
                return Err(MutationError::invalid(name, "has purpose deletions with no value deletion"));
            }
            if additions.is_none() && deletions.is_none() {
                return Err(MutationError::invalid(name, "has no value addition or deletion"));
            }

            ColumnChange::PartialUpdate { additions, deletions }
        } else {
            if request.value_additions.is_some() || request.value_deletions.is_some() {
                return Err(MutationError::invalid(
                    name,
                    "uses value_additions or value_deletions on a column without partial updates",
                ));
            }
            if request
                .purpose_additions
                .iter()
                .any(|p| request.purpose_deletions.contains(p))
            {
                return Err(MutationError::invalid(name, "is trying to add and delete the same purpose"));
            }

            match request.value.unwrap_or(Json::Null) {
                Json::String(s) if s == MUTATOR_COLUMN_CURRENT_VALUE => ColumnChange::KeepCurrent,
                Json::String(s) if s == MUTATOR_COLUMN_DEFAULT_VALUE => {
                    if column.default_value.is_none() {
                        return Err(MutationError::NoDefaultValue(column.name));
                    }
                    ColumnChange::Default
                }
                value => ColumnChange::FullReplace(value),
            }
        };

        Ok(Self {
            column,
            change,
            purpose_additions: request.purpose_additions,
            purpose_deletions: request.purpose_deletions,
        })
    }
}

/// Parses mutator row data keyed by column name.
///
/// `row_data` must name every column in `columns` and nothing else.
pub fn parse_row_data(columns: &[Column], row_data: &Map<String, Json>) -> MutationResult<Vec<ColumnMutation>> {
    for name in row_data.keys() {
        if !columns.iter().any(|c| c.name == *name) {
            return Err(MutationError::UnknownColumn(name.clone()));
        }
    }

    columns
        .iter()
        .map(|column| {
            let json = row_data
                .get(&column.name)
                .ok_or_else(|| MutationError::MissingColumn(column.name.clone()))?;
            let request: ValueAndPurposes = serde_json::from_value(json.clone())
                .map_err(|e| MutationError::invalid(&column.name, format!("is malformed: {}", e)))?;
            ColumnMutation::from_request(column.clone(), request)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnConstraints, DataType};
    use serde_json::json;

    fn scalar() -> Column {
        Column::new("name", DataType::String)
    }

    fn partial() -> Column {
        Column::new("tags", DataType::String)
            .array()
            .with_constraints(ColumnConstraints {
                partial_updates: true,
                ..Default::default()
            })
    }

    fn request(json: Json) -> ValueAndPurposes {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_full_replace_classification() {
        let p = Uuid::new_v4();
        let m = ColumnMutation::from_request(scalar(), request(json!({"value": "x", "purpose_additions": [p]}))).unwrap();
        assert_eq!(m.change, ColumnChange::FullReplace(json!("x")));

        let keep = ColumnMutation::from_request(
            scalar(),
            request(json!({"value": MUTATOR_COLUMN_CURRENT_VALUE, "purpose_deletions": [p]})),
        )
        .unwrap();
        assert_eq!(keep.change, ColumnChange::KeepCurrent);
    }

    #[test]
    fn test_default_sentinel_requires_default() {
        let err = ColumnMutation::from_request(scalar(), request(json!({"value": MUTATOR_COLUMN_DEFAULT_VALUE})));
        assert_eq!(err, Err(MutationError::NoDefaultValue("name".into())));

        let with_default = scalar().with_default(json!("anon"));
        let m = ColumnMutation::from_request(with_default, request(json!({"value": MUTATOR_COLUMN_DEFAULT_VALUE}))).unwrap();
        assert_eq!(m.change, ColumnChange::Default);
    }

    #[test]
    fn test_purpose_rules() {
        let p = Uuid::new_v4();
        assert!(matches!(
            ColumnMutation::from_request(scalar(), request(json!({"value": "x", "purpose_additions": [p, p]}))),
            Err(MutationError::InvalidRequest { .. })
        ));
        assert!(matches!(
            ColumnMutation::from_request(
                scalar(),
                request(json!({"value": "x", "purpose_additions": [p], "purpose_deletions": [p]}))
            ),
            Err(MutationError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_partial_update_rules() {
        let p = Uuid::new_v4();
        let cases = [
            json!({"value": ["a"], "purpose_additions": [p]}),
            json!({"value_additions": ["a"]}),
            json!({"purpose_additions": [p]}),
            json!({"value_additions": ["a"], "purpose_additions": [p], "purpose_deletions": [p]}),
            json!({}),
            json!({"value_additions": "a", "purpose_additions": [p]}),
        ];
        for case in cases {
            assert!(
                ColumnMutation::from_request(partial(), request(case.clone())).is_err(),
                "accepted {}",
                case
            );
        }

        let ok = ColumnMutation::from_request(
            partial(),
            request(json!({"value_additions": ["a"], "purpose_additions": [p], "value_deletions": MUTATOR_COLUMN_CURRENT_VALUE})),
        )
        .unwrap();
        assert_eq!(
            ok.change,
            ColumnChange::PartialUpdate {
                additions: Some(ElementSet::Values(vec![json!("a")])),
                deletions: Some(ElementSet::Current),
            }
        );
    }

    #[test]
    fn test_full_replace_rejects_partial_fields() {
        assert!(ColumnMutation::from_request(scalar(), request(json!({"value_additions": ["a"]}))).is_err());
    }

    #[test]
    fn test_row_data_must_match_columns() {
        let columns = vec![scalar()];
        let extra = json!({"name": {"value": "x"}, "other": {"value": "y"}});
        assert_eq!(
            parse_row_data(&columns, extra.as_object().unwrap()),
            Err(MutationError::UnknownColumn("other".into()))
        );

        let missing = json!({});
        assert_eq!(
            parse_row_data(&columns, missing.as_object().unwrap()),
            Err(MutationError::MissingColumn("name".into()))
        );

        let malformed = json!({"name": {"value": "x", "bogus": 1}});
        assert!(matches!(
            parse_row_data(&columns, malformed.as_object().unwrap()),
            Err(MutationError::InvalidRequest { .. })
        ));
    }
}
