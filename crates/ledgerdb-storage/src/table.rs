//! Persisted table record: schema, rows and metadata

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ledgerdb_common::types::{now_iso8601, ColumnType, Row, Value};

/// Ordered mapping from column name to declared type
pub type Schema = IndexMap<String, ColumnType>;

/// Table-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Number of rows in the sequence, deleted ones included
    #[serde(default)]
    pub row_count: usize,
    /// Primary key column, if declared
    #[serde(default)]
    pub primary_key: Option<String>,
    /// Columns carrying a uniqueness constraint
    #[serde(default)]
    pub unique_keys: Vec<String>,
    /// Table creation timestamp
    #[serde(default)]
    pub created_at: String,
}

/// The unit of persistence: one table, one file.
///
/// Rows are append-mostly. A row's index in `rows` is its position and never
/// changes once assigned; deletion only flips `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub schema: Schema,
    pub rows: Vec<Row>,
    pub metadata: TableMetadata,
}

impl Table {
    /// Create an empty table
    #[must_use]
    pub fn new(schema: Schema, primary_key: Option<String>, unique_keys: Vec<String>) -> Self {
        let mut deduped: Vec<String> = Vec::with_capacity(unique_keys.len());
        for key in unique_keys {
            if !deduped.contains(&key) {
                deduped.push(key);
            }
        }

        Self {
            schema,
            rows: Vec::new(),
            metadata: TableMetadata {
                row_count: 0,
                primary_key,
                unique_keys: deduped,
                created_at: now_iso8601(),
            },
        }
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.schema.contains_key(column)
    }

    /// Rows not soft-deleted, in position order
    pub fn active_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|row| row.is_active())
    }

    /// Whether an active row holds `value` in `column`
    #[must_use]
    pub fn active_value_exists(&self, column: &str, value: &Value) -> bool {
        self.active_rows()
            .any(|row| row.get(column).is_some_and(|v| v == value))
    }

    /// Recompute `row_count` from the row sequence
    pub fn refresh_row_count(&mut self) {
        self.metadata.row_count = self.rows.len();
    }

    /// Re-type values read back from JSON against the schema: ISO strings in
    /// DATE columns become dates, integers in FLOAT columns widen.
    #[allow(clippy::cast_precision_loss)]
    pub fn normalize(&mut self) {
        for row in &mut self.rows {
            for (column, value) in &mut row.values {
                let retyped = match (self.schema.get(column), &*value) {
                    (Some(ColumnType::Date), Value::Text(s)) => Value::Date(s.clone()),
                    (Some(ColumnType::Float), Value::Int(i)) => Value::Float(*i as f64),
                    _ => continue,
                };
                *value = retyped;
            }
        }
    }
}
