//! Selector resolution
//!
//! Parses a selector where clause, binds the caller's values to its `?`
//! placeholders and evaluates the bound predicate against user records.
//!
//! # Grammar
//!
//! ```text
//! clause     := "ALL" | expr
//! expr       := term ("OR" term)*
//! term       := factor ("AND" factor)*
//! factor     := "NOT" factor | "(" expr ")" | comparison
//! comparison := column ( op operand | "IS" ["NOT"] "NULL" )
//! column     := "{" name "}" [ "->>" 'field' ]
//! op         := = | != | <> | < | <= | > | >= | LIKE | ILIKE
//! operand    := "?" | "ANY" "(" "?" ")" | 'string' | integer | TRUE | FALSE
//! ```
//!
//! Comparisons follow SQL null semantics: a null column value never
//! satisfies a comparison.

mod binder;
mod errors;
mod filter;
mod parser;

pub use binder::{BoundColumn, BoundOperand, BoundPredicate, BoundSelector, SelectorBinder};
pub use errors::{SelectorError, SelectorResult};
pub use parser::{ColumnRef, CompareOp, Operand, ParsedSelector, Predicate, SelectorParser};
