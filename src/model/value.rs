//! Typed column values
//!
//! Values are parsed from JSON against a column's declared type and
//! rendered back to JSON for accessor output. Scalar values are totally
//! ordered with nulls first so they can drive cursor pagination.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value as Json;
use thiserror::Error;
use uuid::Uuid;

use super::column::DataType;

/// A single typed value held in a user record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Array(Vec<Value>),
    Composite(BTreeMap<String, Value>),
}

/// Value parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// JSON shape does not match the declared type
    #[error("expected {expected} value, got {found}")]
    TypeMismatch { expected: &'static str, found: String },

    /// JSON shape matches but the content is not valid for the type
    #[error("invalid {data_type} value: {value}")]
    Invalid { data_type: &'static str, value: String },
}

fn ssn_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\d{3}-?\d{2}-?\d{4}$").ok())
        .as_ref()
}

impl Value {
    /// Builds a timestamp value truncated to microsecond precision
    pub fn timestamp(dt: DateTime<Utc>) -> Self {
        let micros = dt.timestamp_micros();
        Value::Timestamp(DateTime::from_timestamp_micros(micros).unwrap_or(dt))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Array(_) => "array",
            Value::Composite(_) => "composite",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Uuid(_) => 4,
            Value::String(_) => 5,
            Value::Array(_) => 6,
            Value::Composite(_) => 7,
        }
    }

    /// Total order over values.
    ///
    /// Nulls sort before everything else. Values of the same type use their
    /// natural ordering; mixed types fall back to a fixed type rank.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Composite(a), Value::Composite(b)) => {
                Json::Object(composite_to_json(a))
                    .to_string()
                    .cmp(&Json::Object(composite_to_json(b)).to_string())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Parses a JSON value for a column of the given type.
    ///
    /// Array columns expect a JSON array whose elements each parse as the
    /// element type. JSON null is accepted for every type.
    pub fn from_json(data_type: DataType, is_array: bool, json: &Json) -> Result<Value, ValueError> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        if !is_array {
            return Self::scalar_from_json(data_type, json);
        }
        match json {
            Json::Array(items) => items
                .iter()
                .map(|item| Self::scalar_from_json(data_type, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(ValueError::TypeMismatch {
                expected: "array",
                found: json_type_name(other).to_string(),
            }),
        }
    }

    /// Parses a single (non-array) value of the given type
    pub fn scalar_from_json(data_type: DataType, json: &Json) -> Result<Value, ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            expected: data_type.as_str(),
            found: json_type_name(json).to_string(),
        };
        let invalid = |value: &str| ValueError::Invalid {
            data_type: data_type.as_str(),
            value: value.to_string(),
        };

        match (data_type, json) {
            (_, Json::Null) => Ok(Value::Null),
            (DataType::Boolean, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (DataType::Integer, Json::Number(n)) => n.as_i64().map(Value::Int).ok_or_else(|| invalid(&n.to_string())),
            (DataType::String, Json::String(s)) => Ok(Value::String(s.clone())),
            (DataType::Email, Json::String(s)) => {
                let valid = s
                    .split_once('@')
                    .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                    .unwrap_or(false);
                if valid {
                    Ok(Value::String(s.clone()))
                } else {
                    Err(invalid(s))
                }
            }
            (DataType::Ssn, Json::String(s)) => {
                if ssn_pattern().map(|p| p.is_match(s)).unwrap_or(false) {
                    Ok(Value::String(s.clone()))
                } else {
                    Err(invalid(s))
                }
            }
            (DataType::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::timestamp(dt.with_timezone(&Utc)))
                .map_err(|_| invalid(s)),
            (DataType::Uuid, Json::String(s)) => Uuid::parse_str(s).map(Value::Uuid).map_err(|_| invalid(s)),
            (DataType::Composite, Json::Object(fields)) => {
                let mut parsed = BTreeMap::new();
                for (name, field) in fields {
                    parsed.insert(name.clone(), Self::from_untyped_json(field));
                }
                Ok(Value::Composite(parsed))
            }
            _ => Err(mismatch()),
        }
    }

    fn from_untyped_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.iter().map(Self::from_untyped_json).collect()),
            Json::Object(fields) => Value::Composite(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_untyped_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as JSON for accessor output
    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::String(s) => Json::String(s.clone()),
            Value::Timestamp(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Value::Uuid(id) => Json::String(id.to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Composite(fields) => Json::Object(composite_to_json(fields)),
        }
    }

    /// Renders the value as plain text (transformer input, LIKE matching)
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uuid(id) => id.to_string(),
            Value::Timestamp(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            Value::Array(_) | Value::Composite(_) => self.to_json().to_string(),
        }
    }
}

fn composite_to_json(fields: &BTreeMap<String, Value>) -> serde_json::Map<String, Json> {
    fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
