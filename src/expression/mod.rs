//! A small expression dialect for the filters that evaluate embedded
//! expressions (`group_by_exp`, `where_exp`).
//!
//! ```text
//! condition := value [comparator value]
//! comparator := `==` | `!=` | `<>` | `<` | `>` | `<=` | `>=` | `contains`
//! value := primary (`|` ident [`:` primary (`,` primary)*])*
//! primary := string | int | float | `true` | `false` | `nil` | `null`
//!          | `empty` | `blank` | path
//! path := ident (`.` (ident | int) | `[` (int | string) `]`)*
//! ```
use std::{cmp::Ordering, sync::Arc};

use sitefilters_filter_types::{other, ContextView, IValue, Result, Value};

use crate::filter::dispatch_filter;

mod parser;
mod scanner;

pub use parser::{ParseError, Parser};
pub use scanner::{Lexeme, Scanner, Token};

/// A literal or variable lookup, the start of an [`Expression`].
#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    Literal(IValue),
    /// The `empty` keyword, equal to empty strings, lists and structures.
    Empty,
    /// The `blank` keyword, equal to anything `empty` is, as well as `nil`,
    /// `false` and whitespace-only strings.
    Blank,
    /// A variable `root`, followed by property lookups.
    Path { root: Arc<str>, keys: Vec<Arc<str>> },
}

/// A call to a registered filter in an expression, `| name: args...`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: Arc<str>,
    pub args: Vec<Primary>,
}

/// A value expression, a [`Primary`] piped through zero or more filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub primary: Primary,
    pub filters: Vec<FilterCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
}

/// A condition, `left [comparator right]`.  Without a comparator, it tests
/// whether `left` is truthy.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: Expression,
    pub comparison: Option<(Comparator, Expression)>,
}

/// Parses `source` as a value [`Expression`].
///
/// # Errors
///
/// Returns an `Err` if `source` is not a valid expression.
pub fn parse_value(source: &str) -> Result<Expression> {
    Parser::new(source)
        .parse_value()
        .map_err(|e| other!("invalid expression `{source}`: {e}"))
}

/// Parses `source` as a [`Condition`].
///
/// # Errors
///
/// Returns an `Err` if `source` is not a valid condition.
pub fn parse_condition(source: &str) -> Result<Condition> {
    Parser::new(source)
        .parse_condition()
        .map_err(|e| other!("invalid condition `{source}`: {e}"))
}

/// Only `false` and `nil` are falsy.
#[inline]
#[must_use]
pub const fn is_truthy(value: &IValue) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

impl Primary {
    /// Evaluates this primary.  The keywords `empty` and `blank` evaluate to
    /// the empty string outside of a comparison.
    #[must_use]
    pub fn evaluate(&self, ctx: &dyn ContextView) -> IValue {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Empty | Self::Blank => Value::String("".into()),
            Self::Path { root, keys } => {
                let Some(value) = ctx.get(root) else {
                    return Value::Null;
                };

                keys.iter()
                    .try_fold(value, |value, key| value.property(key))
                    .unwrap_or(Value::Null)
            }
        }
    }
}

impl Expression {
    /// Evaluates this expression, applying each filter in order.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if a filter is not registered or fails.
    pub fn evaluate(&self, ctx: &mut dyn ContextView) -> Result<IValue> {
        let mut value = self.primary.evaluate(ctx);

        for filter in &self.filters {
            let args = filter.args.iter().map(|arg| arg.evaluate(&*ctx)).collect();
            value = dispatch_filter(&filter.name, value, args, ctx)?;
        }

        Ok(value)
    }

    fn operand(&self, ctx: &mut dyn ContextView) -> Result<Operand> {
        match (&self.primary, self.filters.is_empty()) {
            (Primary::Empty, true) => Ok(Operand::Empty),
            (Primary::Blank, true) => Ok(Operand::Blank),
            _ => self.evaluate(ctx).map(Operand::Value),
        }
    }
}

impl Condition {
    /// Evaluates this condition.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if either side fails to evaluate, or the values of an
    /// ordering comparison (`<`, `>`, `<=`, `>=`) have no order between them.
    pub fn evaluate(&self, ctx: &mut dyn ContextView) -> Result<bool> {
        let Some((comparator, right)) = &self.comparison else {
            return self.left.evaluate(ctx).map(|value| is_truthy(&value));
        };

        let left = self.left.operand(ctx)?;
        let right = right.operand(ctx)?;

        Ok(match comparator {
            Comparator::Eq => left.equals(&right),
            Comparator::Ne => !left.equals(&right),
            Comparator::Lt => left.value().natural_cmp(&right.value())?.is_lt(),
            Comparator::Gt => left.value().natural_cmp(&right.value())?.is_gt(),
            Comparator::Le => left.value().natural_cmp(&right.value())?.is_le(),
            Comparator::Ge => left.value().natural_cmp(&right.value())?.is_ge(),
            Comparator::Contains => contains(&left.value(), &right.value()),
        })
    }
}

/// One side of a comparison.
enum Operand {
    Value(IValue),
    Empty,
    Blank,
}

impl Operand {
    fn value(&self) -> IValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::Empty | Self::Blank => Value::String("".into()),
        }
    }

    fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => loose_eq(a, b),
            (Self::Empty, Self::Value(v)) | (Self::Value(v), Self::Empty) => is_empty(v),
            (Self::Blank, Self::Value(v)) | (Self::Value(v), Self::Blank) => is_blank(v),
            _ => true,
        }
    }
}

/// Equality where `Int` and `Float` compare by numeric value.
fn loose_eq(a: &IValue, b: &IValue) -> bool {
    match (a, b) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            a.natural_cmp(b).is_ok_and(Ordering::is_eq)
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        _ => a == b,
    }
}

fn is_empty(value: &IValue) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::List(l) => l.is_empty(),
        Value::Structure(s) => s.is_empty(),
        _ => false,
    }
}

fn is_blank(value: &IValue) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        other => is_empty(other),
    }
}

fn contains(haystack: &IValue, needle: &IValue) -> bool {
    if needle.is_null() {
        return false;
    }

    match haystack {
        Value::String(s) => s.contains(&*needle.to_text()),
        Value::List(l) => l.iter().any(|x| loose_eq(x, needle)),
        Value::Structure(s) => s.contains_key(&*needle.to_text()),
        _ => false,
    }
}
