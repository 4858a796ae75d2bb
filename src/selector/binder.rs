//! Binds caller values to a parsed selector

use regex::Regex;
use serde_json::Value as Json;

use crate::model::{system_column_type, Column, DataType, SelectorConfig, Value};

use super::errors::{SelectorError, SelectorResult};
use super::parser::{ColumnRef, CompareOp, Operand, Predicate, SelectorParser};

/// A column reference resolved against the userstore schema
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub name: String,
    /// `None` for system columns
    pub column: Option<Column>,
    /// Composite field selected with `->>`
    pub field: Option<String>,
}

impl BoundColumn {
    /// Type that operands are parsed as
    fn operand_type(&self) -> DataType {
        if self.field.is_some() {
            return DataType::String;
        }
        match &self.column {
            Some(column) => column.data_type,
            None => system_column_type(&self.name).unwrap_or(DataType::String),
        }
    }

    fn is_textual(&self) -> bool {
        matches!(
            self.operand_type(),
            DataType::String | DataType::Email | DataType::Ssn
        )
    }

    fn is_whole_composite(&self) -> bool {
        self.field.is_none()
            && self
                .column
                .as_ref()
                .map(|c| c.data_type.is_composite())
                .unwrap_or(false)
    }
}

/// Bound right-hand side of a comparison
#[derive(Debug, Clone)]
pub enum BoundOperand {
    Value(Value),
    Values(Vec<Value>),
    Pattern(Regex),
}

/// Predicate tree with every placeholder replaced by a typed value
#[derive(Debug, Clone)]
pub enum BoundPredicate {
    All,
    Compare {
        column: BoundColumn,
        op: CompareOp,
        operand: BoundOperand,
    },
    IsNull {
        column: BoundColumn,
        negated: bool,
    },
    And(Box<BoundPredicate>, Box<BoundPredicate>),
    Or(Box<BoundPredicate>, Box<BoundPredicate>),
    Not(Box<BoundPredicate>),
}

/// A selector ready to be evaluated against user records
#[derive(Debug, Clone)]
pub struct BoundSelector {
    pub predicate: BoundPredicate,
}

impl BoundSelector {
    /// Selector matching every user
    pub fn all() -> Self {
        Self {
            predicate: BoundPredicate::All,
        }
    }
}

/// Resolves selector configs against the userstore columns
pub struct SelectorBinder<'a> {
    columns: &'a [Column],
}

impl<'a> SelectorBinder<'a> {
    pub fn new(columns: &'a [Column]) -> Self {
        Self { columns }
    }

    /// Parses `config` and binds `values` to its placeholders, in order
    pub fn bind(&self, config: &SelectorConfig, values: &[Json]) -> SelectorResult<BoundSelector> {
        let parsed = SelectorParser::parse(&config.where_clause)?;
        if parsed.placeholders != values.len() {
            return Err(SelectorError::ArityMismatch {
                expected: parsed.placeholders,
                got: values.len(),
            });
        }

        Ok(BoundSelector {
            predicate: self.bind_predicate(parsed.predicate, values)?,
        })
    }

    fn bind_predicate(&self, predicate: Predicate, values: &[Json]) -> SelectorResult<BoundPredicate> {
        Ok(match predicate {
            Predicate::All => BoundPredicate::All,
            Predicate::IsNull { column, negated } => BoundPredicate::IsNull {
                column: self.bind_column(column)?,
                negated,
            },
            Predicate::Compare { column, op, operand } => {
                let column = self.bind_column(column)?;
                let operand = Self::bind_operand(&column, op, operand, values)?;
                BoundPredicate::Compare { column, op, operand }
            }
            Predicate::And(left, right) => BoundPredicate::And(
                Box::new(self.bind_predicate(*left, values)?),
                Box::new(self.bind_predicate(*right, values)?),
            ),
            Predicate::Or(left, right) => BoundPredicate::Or(
                Box::new(self.bind_predicate(*left, values)?),
                Box::new(self.bind_predicate(*right, values)?),
            ),
            Predicate::Not(inner) => BoundPredicate::Not(Box::new(self.bind_predicate(*inner, values)?)),
        })
    }

    fn bind_column(&self, reference: ColumnRef) -> SelectorResult<BoundColumn> {
        let column = if system_column_type(&reference.name).is_some() {
            None
        } else {
            let found = self
                .columns
                .iter()
                .find(|c| c.name == reference.name)
                .ok_or_else(|| SelectorError::UnknownColumn(reference.name.clone()))?;
            Some(found.clone())
        };

        if reference.field.is_some() {
            let composite = column
                .as_ref()
                .map(|c| c.data_type.is_composite())
                .unwrap_or(false);
            if !composite {
                return Err(SelectorError::UnsupportedOperator {
                    column: reference.name,
                    op: "->>".to_string(),
                });
            }
        }

        Ok(BoundColumn {
            name: reference.name,
            column,
            field: reference.field,
        })
    }

    fn bind_operand(
        column: &BoundColumn,
        op: CompareOp,
        operand: Operand,
        values: &[Json],
    ) -> SelectorResult<BoundOperand> {
        let unsupported = || SelectorError::UnsupportedOperator {
            column: column.name.clone(),
            op: op.as_str().to_string(),
        };

        if column.is_whole_composite() {
            return Err(unsupported());
        }

        let (index, json) = match &operand {
            Operand::Placeholder(index) | Operand::Any(index) => {
                let json = values.get(*index).ok_or(SelectorError::ArityMismatch {
                    expected: index + 1,
                    got: values.len(),
                })?;
                (*index, json.clone())
            }
            Operand::Literal(json) => (0, json.clone()),
        };
        let invalid = |reason: String| SelectorError::InvalidValue { index, reason };

        match (op, &operand) {
            (CompareOp::Like | CompareOp::ILike, Operand::Any(_)) => Err(unsupported()),
            (CompareOp::Like | CompareOp::ILike, _) => {
                if !column.is_textual() {
                    return Err(unsupported());
                }
                let pattern = json
                    .as_str()
                    .ok_or_else(|| invalid("LIKE pattern must be a string".to_string()))?;
                like_pattern(pattern, op == CompareOp::ILike)
                    .map(BoundOperand::Pattern)
                    .map_err(|e| invalid(e.to_string()))
            }
            (_, Operand::Any(_)) => {
                let items = json.as_array().ok_or(SelectorError::ExpectedArray { index })?;
                items
                    .iter()
                    .map(|item| Value::scalar_from_json(column.operand_type(), item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(BoundOperand::Values)
                    .map_err(|e| invalid(e.to_string()))
            }
            _ => Value::scalar_from_json(column.operand_type(), &json)
                .map(BoundOperand::Value)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

/// Translates a SQL LIKE pattern into an anchored regex
fn like_pattern(pattern: &str, case_insensitive: bool) -> Result<Regex, regex::Error> {
    let mut re = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re)
}
