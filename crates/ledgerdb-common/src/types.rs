//! Common type definitions for LedgerDB

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, QueryError};

/// Stable ordinal of a row within a table's full row sequence
pub type Position = usize;

/// Column-keyed output row, as returned by `select` and `join`
pub type Record = IndexMap<String, Value>;

/// Name of the engine-managed soft-delete flag
pub const IS_DELETED: &str = "is_deleted";

/// Name of the engine-managed creation timestamp
pub const CREATED_AT: &str = "created_at";

/// Row fields the engine manages; user schemas may not declare them
pub const RESERVED_COLUMNS: [&str; 2] = [IS_DELETED, CREATED_AT];

/// Whether `name` collides with an engine-managed row field
#[must_use]
pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

/// Current time as an ISO-8601 string (UTC, microsecond precision)
#[must_use]
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

// ============================================================================
// Column Types
// ============================================================================

/// Primitive column types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Boolean,
    Date,
}

impl ColumnType {
    /// Parse a type name, case-insensitively, accepting common aliases
    pub fn parse(name: &str) -> crate::Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(ColumnType::Int),
            "FLOAT" | "REAL" | "DOUBLE" => Ok(ColumnType::Float),
            "TEXT" | "VARCHAR" | "STRING" => Ok(ColumnType::Text),
            "BOOLEAN" | "BOOL" => Ok(ColumnType::Boolean),
            "DATE" => Ok(ColumnType::Date),
            other => Err(Error::Query(QueryError::UnknownColumnType(other.to_string()))),
        }
    }

    /// Canonical upper-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::Float => "FLOAT",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Values
// ============================================================================

/// A typed cell value.
///
/// Serialized untagged, so the persisted form is plain JSON. `Date` holds an
/// ISO `YYYY-MM-DD` string; it deserializes as `Text` and is re-tagged
/// against the table schema on load.
///
/// Equality is kind-aware rather than structural: `Int` and `Float` compare
/// numerically, `Text` and `Date` compare by string content. `Hash` agrees
/// with that equality, so values of either numeric kind find each other in
/// an index.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(String),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String view for `Text` and `Date`
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Date(s) => Some(s),
            _ => None,
        }
    }

    /// Ordering between comparable kinds; `None` when the kinds don't compare
    /// (null on either side, text against number, and so on).
    ///
    /// `Int` against `Float` compares exactly, without rounding the integer
    /// through `f64`.
    #[must_use]
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(i), Value::Float(f)) => Value::compare_int_float(*i, *f),
            (Value::Float(f), Value::Int(i)) => {
                Value::compare_int_float(*i, *f).map(Ordering::reverse)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (a, b) => Some(a.as_str()?.cmp(b.as_str()?)),
        }
    }

    /// The integer a float holds exactly, if any.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn integral(f: f64) -> Option<i64> {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
            Some(f as i64)
        } else {
            None
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
        if f.is_nan() {
            return None;
        }
        if let Some(j) = Value::integral(f) {
            return Some(i.cmp(&j));
        }
        // Beyond the i64 range (infinities included)
        if f >= i64::MAX as f64 {
            return Some(Ordering::Less);
        }
        if f < i64::MIN as f64 {
            return Some(Ordering::Greater);
        }
        // Fractional and in range, so the floor is exact
        let floor = f.floor() as i64;
        Some(if i <= floor {
            Ordering::Less
        } else {
            Ordering::Greater
        })
    }
}

/// Equality agrees with [`Hash`]: an `Int` equals a `Float` only when the
/// float holds exactly that integer.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => {
                Value::integral(*f) == Some(*i)
            }
            (a, b) => match (a.as_str(), b.as_str()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => match Value::integral(*f) {
                Some(i) => {
                    2u8.hash(state);
                    i.hash(state);
                }
                None => {
                    3u8.hash(state);
                    if f.is_nan() {
                        f64::NAN.to_bits().hash(state);
                    } else {
                        f.to_bits().hash(state);
                    }
                }
            },
            Value::Text(s) | Value::Date(s) => {
                4u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Text(s) | Value::Date(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Rows
// ============================================================================

/// A stored row: user columns plus the two engine-managed fields.
///
/// Persisted as one flat JSON object, user columns first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Row {
    /// User columns in insertion order
    #[serde(flatten)]
    pub values: IndexMap<String, Value>,
    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp, set once
    #[serde(default)]
    pub created_at: String,
}

impl Row {
    /// Create an active row stamped with the current time
    #[must_use]
    pub fn new(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            is_deleted: false,
            created_at: now_iso8601(),
        }
    }

    /// Get a user column value by name
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Get any field by name, including the engine-managed ones
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            IS_DELETED => Some(Cow::Owned(Value::Bool(self.is_deleted))),
            CREATED_AT => Some(Cow::Owned(Value::Text(self.created_at.clone()))),
            _ => self.values.get(name).map(Cow::Borrowed),
        }
    }

    /// Whether the row is active (not soft-deleted)
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Flatten into a record carrying the engine-managed fields
    #[must_use]
    pub fn to_record(&self) -> Record {
        let mut record = self.values.clone();
        record.insert(IS_DELETED.to_string(), Value::Bool(self.is_deleted));
        record.insert(CREATED_AT.to_string(), Value::Text(self.created_at.clone()));
        record
    }
}
