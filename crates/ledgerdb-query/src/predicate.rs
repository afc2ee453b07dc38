//! Single-comparison predicates

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use ledgerdb_common::types::{Record, Row, Value};

/// Comparison operator of a predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// Anything else the caller passed; never matches
    Other(String),
}

impl Operator {
    /// Map an operator symbol; unrecognized symbols become [`Operator::Other`]
    #[must_use]
    pub fn parse(symbol: &str) -> Self {
        match symbol {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            other => Operator::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Other(symbol) => symbol,
        }
    }

    /// Apply the operator. Ordering operators are false for kinds that don't
    /// compare (null, text against number, ...).
    #[must_use]
    pub fn evaluate(&self, actual: &Value, expected: &Value) -> bool {
        let ordering = || actual.compare(expected);
        match self {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Lt => ordering() == Some(Ordering::Less),
            Operator::Gt => ordering() == Some(Ordering::Greater),
            Operator::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Operator::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Other(_) => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything a predicate can read a named field from
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<Cow<'_, Value>>;
}

impl FieldSource for Row {
    fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        Row::field(self, name)
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.get(name).map(Cow::Borrowed)
    }
}

/// `column operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an equality predicate
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Eq, value)
    }

    /// Evaluate against one row. A missing or null field whose name is
    /// qualified (`table.column`) is retried under the bare column name.
    pub fn matches<S: FieldSource + ?Sized>(&self, source: &S) -> bool {
        let found = match source.field(&self.column) {
            Some(value) if !value.is_null() => Some(value),
            direct => match self.column.rsplit_once('.') {
                Some((_, bare)) => source.field(bare).or(direct),
                None => direct,
            },
        };

        let null = Value::Null;
        let actual = found.as_deref().unwrap_or(&null);
        self.operator.evaluate(actual, &self.value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}
