//! Where clause parser

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as Json;

use super::errors::{SelectorError, SelectorResult};

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

/// Reference to a column, optionally to one field of a composite column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub name: String,
    pub field: Option<String>,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    ILike,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => "ILIKE",
        }
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `?`, bound to the selector value at this index
    Placeholder(usize),
    /// `ANY (?)`, bound to an array selector value at this index
    Any(usize),
    /// Literal written in the clause
    Literal(Json),
}

/// Parsed predicate tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    All,
    Compare {
        column: ColumnRef,
        op: CompareOp,
        operand: Operand,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

/// A parsed where clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    pub predicate: Predicate,
    /// Number of `?` placeholders, i.e. selector values expected
    pub placeholders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Column(String),
    Arrow,
    Str(String),
    Int(i64),
    Placeholder,
    LParen,
    RParen,
    Op(CompareOp),
    Not,
    And,
    Or,
    Is,
    Null,
    Any,
    All,
    True,
    False,
}

fn syntax(position: usize, message: impl Into<String>) -> SelectorError {
    SelectorError::Syntax {
        position,
        message: message.into(),
    }
}

fn tokenize(input: &str) -> SelectorResult<Vec<(Token, usize)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '{' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == '}')
                    .map(|offset| i + offset)
                    .ok_or_else(|| syntax(start, "unterminated column reference"))?;
                let name: String = chars[i + 1..close].iter().collect();
                let valid = identifier_pattern()
                    .map(|p| p.is_match(&name))
                    .unwrap_or(false);
                if !valid {
                    return Err(SelectorError::InvalidColumnName(name));
                }
                tokens.push((Token::Column(name), start));
                i = close + 1;
            }
            '(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            '?' => {
                tokens.push((Token::Placeholder, start));
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'>') && chars.get(i + 2) == Some(&'>') => {
                tokens.push((Token::Arrow, start));
                i += 3;
            }
            '-' | '0'..='9' => {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| syntax(start, format!("invalid integer '{}'", text)))?;
                tokens.push((Token::Int(value), start));
            }
            '\'' => {
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(syntax(start, "unterminated string literal")),
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            text.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(text), start));
            }
            '=' => {
                tokens.push((Token::Op(CompareOp::Eq), start));
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push((Token::Op(CompareOp::NotEq), start));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push((Token::Op(CompareOp::Lte), start));
                    i += 2;
                }
                Some('>') => {
                    tokens.push((Token::Op(CompareOp::NotEq), start));
                    i += 2;
                }
                _ => {
                    tokens.push((Token::Op(CompareOp::Lt), start));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Op(CompareOp::Gte), start));
                    i += 2;
                } else {
                    tokens.push((Token::Op(CompareOp::Gt), start));
                    i += 1;
                }
            }
            c if c.is_ascii_alphabetic() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "IS" => Token::Is,
                    "NULL" => Token::Null,
                    "ANY" => Token::Any,
                    "ALL" => Token::All,
                    "TRUE" => Token::True,
                    "FALSE" => Token::False,
                    "LIKE" => Token::Op(CompareOp::Like),
                    "ILIKE" => Token::Op(CompareOp::ILike),
                    _ => return Err(syntax(start, format!("unexpected word '{}'", word))),
                };
                tokens.push((token, start));
            }
            other => return Err(syntax(start, format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

/// Recursive-descent parser over where clause tokens
pub struct SelectorParser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    placeholders: usize,
    end: usize,
}

impl SelectorParser {
    /// Parses a where clause
    pub fn parse(clause: &str) -> SelectorResult<ParsedSelector> {
        let tokens = tokenize(clause)?;
        if tokens.is_empty() {
            return Err(syntax(0, "empty where clause"));
        }
        if tokens.len() == 1 && tokens[0].0 == Token::All {
            return Ok(ParsedSelector {
                predicate: Predicate::All,
                placeholders: 0,
            });
        }

        let mut parser = SelectorParser {
            tokens,
            pos: 0,
            placeholders: 0,
            end: clause.len(),
        };
        let predicate = parser.parse_expr()?;
        if let Some((token, position)) = parser.tokens.get(parser.pos) {
            return Err(syntax(*position, format!("unexpected trailing {:?}", token)));
        }

        Ok(ParsedSelector {
            predicate,
            placeholders: parser.placeholders,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> SelectorResult<()> {
        let position = self.position();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax(position, format!("expected {:?}, found {:?}", expected, token))),
            None => Err(syntax(position, format!("expected {:?}", expected))),
        }
    }

    fn parse_expr(&mut self) -> SelectorResult<Predicate> {
        let mut left = self.parse_term()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.parse_term()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> SelectorResult<Predicate> {
        let mut left = self.parse_factor()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_factor()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> SelectorResult<Predicate> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Predicate::Not(Box::new(self.parse_factor()?)))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> SelectorResult<Predicate> {
        let position = self.position();
        let name = match self.next() {
            Some(Token::Column(name)) => name,
            Some(token) => return Err(syntax(position, format!("expected column, found {:?}", token))),
            None => return Err(syntax(position, "expected column")),
        };

        let field = if self.peek() == Some(&Token::Arrow) {
            self.pos += 1;
            let position = self.position();
            match self.next() {
                Some(Token::Str(field)) => Some(field),
                _ => return Err(syntax(position, "expected quoted field name after ->>")),
            }
        } else {
            None
        };
        let column = ColumnRef { name, field };

        let position = self.position();
        match self.next() {
            Some(Token::Is) => {
                let negated = self.peek() == Some(&Token::Not);
                if negated {
                    self.pos += 1;
                }
                self.expect(Token::Null)?;
                Ok(Predicate::IsNull { column, negated })
            }
            Some(Token::Op(op)) => {
                let operand = self.parse_operand(&column, op)?;
                Ok(Predicate::Compare { column, op, operand })
            }
            Some(token) => Err(syntax(position, format!("expected operator, found {:?}", token))),
            None => Err(syntax(position, "expected operator")),
        }
    }

    fn parse_operand(&mut self, column: &ColumnRef, op: CompareOp) -> SelectorResult<Operand> {
        let position = self.position();
        match self.next() {
            Some(Token::Placeholder) => {
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Operand::Placeholder(index))
            }
            Some(Token::Any) => {
                if op != CompareOp::Eq {
                    return Err(SelectorError::UnsupportedOperator {
                        column: column.name.clone(),
                        op: format!("{} ANY", op.as_str()),
                    });
                }
                self.expect(Token::LParen)?;
                self.expect(Token::Placeholder)?;
                self.expect(Token::RParen)?;
                let index = self.placeholders;
                self.placeholders += 1;
                Ok(Operand::Any(index))
            }
            Some(Token::Str(s)) => Ok(Operand::Literal(Json::String(s))),
            Some(Token::Int(i)) => Ok(Operand::Literal(Json::from(i))),
            Some(Token::True) => Ok(Operand::Literal(Json::Bool(true))),
            Some(Token::False) => Ok(Operand::Literal(Json::Bool(false))),
            Some(token) => Err(syntax(position, format!("expected operand, found {:?}", token))),
            None => Err(syntax(position, "expected operand")),
        }
    }
}
