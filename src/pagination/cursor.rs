//! Cursor codec
//!
//! A cursor is `key:value` pairs joined by `,`, one pair per active sort
//! key and in the same order. Values are rendered as:
//!
//! - uuid: hyphenated text
//! - integer: decimal
//! - boolean: `true` / `false`
//! - timestamp: unix microseconds
//! - string: percent-escaped (`%`, `,`, `:`), with `%e` for the empty string
//! - null: empty value (nullable keys only)

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Value;

use super::errors::{PaginationError, PaginationResult};
use super::keys::{KeyType, SortKey};

/// Cursor marking the beginning of the result set
pub const CURSOR_BEGIN: &str = "";

/// Cursor marking the end of the result set
pub const CURSOR_END: &str = "end";

const EMPTY_STRING: &str = "%e";

/// Opaque pagination cursor
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn begin() -> Self {
        Self(CURSOR_BEGIN.to_string())
    }

    pub fn end() -> Self {
        Self(CURSOR_END.to_string())
    }

    pub fn is_begin(&self) -> bool {
        self.0 == CURSOR_BEGIN
    }

    pub fn is_end(&self) -> bool {
        self.0 == CURSOR_END
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded cursor position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorPosition {
    /// A sentinel: no boundary in the paging direction
    Unbounded,
    /// Sort key values of the row the cursor points at
    At(Vec<Value>),
}

/// Encodes and decodes cursors for a fixed sort key list
pub struct CursorCodec;

impl CursorCodec {
    /// Encodes one row's sort key values into a cursor.
    ///
    /// `values` must hold exactly one value per key, in key order.
    pub fn encode(keys: &[SortKey], values: &[Value]) -> PaginationResult<Cursor> {
        if keys.len() != values.len() {
            return Err(PaginationError::Unencodable {
                key: keys.last().map(|k| k.name.clone()).unwrap_or_default(),
                reason: format!("expected {} values, got {}", keys.len(), values.len()),
            });
        }

        let mut pairs = Vec::with_capacity(keys.len());
        for (key, value) in keys.iter().zip(values) {
            let rendered = Self::encode_value(key, value)?;
            pairs.push(format!("{}:{}", key.name, rendered));
        }
        Ok(Cursor(pairs.join(",")))
    }

    fn encode_value(key: &SortKey, value: &Value) -> PaginationResult<String> {
        let unencodable = |reason: &str| PaginationError::Unencodable {
            key: key.name.clone(),
            reason: reason.to_string(),
        };

        match (key.key_type, value) {
            (_, Value::Null) if key.nullable => Ok(String::new()),
            (_, Value::Null) => Err(unencodable("null value for non-nullable key")),
            (KeyType::Uuid, Value::Uuid(id)) => Ok(id.to_string()),
            (KeyType::Integer, Value::Int(i)) => Ok(i.to_string()),
            (KeyType::Boolean, Value::Bool(b)) => Ok(b.to_string()),
            (KeyType::Timestamp, Value::Timestamp(ts)) => Ok(ts.timestamp_micros().to_string()),
            (KeyType::String, Value::String(s)) if s.is_empty() => Ok(EMPTY_STRING.to_string()),
            (KeyType::String, Value::String(s)) => Ok(escape(s)),
            (_, other) => Err(unencodable(&format!("unexpected {} value", other.type_name()))),
        }
    }

    /// Decodes a cursor against the active sort keys.
    ///
    /// Sentinels decode to [`CursorPosition::Unbounded`] and never fail.
    pub fn decode(cursor: &Cursor, keys: &[SortKey], max_len: usize) -> PaginationResult<CursorPosition> {
        if cursor.is_begin() || cursor.is_end() {
            return Ok(CursorPosition::Unbounded);
        }
        if cursor.0.len() > max_len {
            return Err(PaginationError::CursorTooLong {
                len: cursor.0.len(),
                max: max_len,
            });
        }

        let pairs: Vec<&str> = cursor.0.split(',').collect();
        if pairs.len() != keys.len() {
            return Err(PaginationError::MalformedCursor(format!(
                "expected {} key/value pairs, found {}",
                keys.len(),
                pairs.len()
            )));
        }

        let mut values = Vec::with_capacity(keys.len());
        for (pair, key) in pairs.into_iter().zip(keys) {
            let (name, raw) = pair.split_once(':').ok_or_else(|| {
                PaginationError::MalformedCursor(format!("pair '{}' is missing ':'", pair))
            })?;
            if name != key.name {
                return Err(PaginationError::MalformedCursor(format!(
                    "expected key '{}', found '{}'",
                    key.name, name
                )));
            }
            values.push(Self::decode_value(key, raw)?);
        }
        Ok(CursorPosition::At(values))
    }

    fn decode_value(key: &SortKey, raw: &str) -> PaginationResult<Value> {
        let malformed = || {
            PaginationError::MalformedCursor(format!(
                "value '{}' is not valid for key '{}'",
                raw, key.name
            ))
        };

        if raw.is_empty() {
            return if key.nullable {
                Ok(Value::Null)
            } else {
                Err(malformed())
            };
        }

        match key.key_type {
            KeyType::Uuid => Uuid::parse_str(raw).map(Value::Uuid).map_err(|_| malformed()),
            KeyType::Integer => raw.parse::<i64>().map(Value::Int).map_err(|_| malformed()),
            KeyType::Boolean => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(malformed()),
            },
            KeyType::Timestamp => raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_micros)
                .map(Value::Timestamp)
                .ok_or_else(malformed),
            KeyType::String if raw == EMPTY_STRING => Ok(Value::String(String::new())),
            KeyType::String => unescape(raw).map(Value::String).ok_or_else(malformed),
        }
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ',' => out.push_str("%2C"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let hex: String = chars.by_ref().take(2).collect();
        match hex.as_str() {
            "25" => out.push('%'),
            "2C" => out.push(','),
            "3A" => out.push(':'),
            _ => return None,
        }
    }
    Some(out)
}
