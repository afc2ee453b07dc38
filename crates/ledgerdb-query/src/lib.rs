//! LedgerDB Query Engine
//!
//! Provides:
//! - CRUD with type coercion and key constraints
//! - Single-comparison predicates
//! - Inner equality joins, index-assisted when possible
//! - Single-writer transactions over a copy-on-write buffer
//! - A SQL-like statement parser producing [`Command`]s

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analyzer;
pub mod command;
pub mod executor;
pub mod parser;
pub mod predicate;

mod engine;

pub use command::Command;
pub use engine::QueryEngine;
pub use parser::Parser;
pub use predicate::{Operator, Predicate};

use serde::{Deserialize, Serialize};

use ledgerdb_common::types::Record;

/// Query result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// Result rows
    rows: Vec<Record>,
    /// Number of rows affected
    rows_affected: u64,
    /// Column names
    columns: Vec<String>,
    /// Status line for statements without a result set
    message: Option<String>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a result set; columns follow the first row
    #[must_use]
    pub fn new(rows: Vec<Record>) -> Self {
        let columns = rows
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        Self {
            rows_affected: rows.len() as u64,
            rows,
            columns,
            message: None,
            execution_time_ms: 0,
        }
    }

    /// Result of a statement that changed rows
    #[must_use]
    pub fn affected(count: usize, message: impl Into<String>) -> Self {
        Self {
            rows_affected: count as u64,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Result carrying only a status message
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Get rows
    #[must_use]
    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Get columns
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get rows affected
    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Get the status message
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Convert to JSON: the rows for a result set, otherwise the status
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match &self.message {
            Some(message) if self.rows.is_empty() => serde_json::json!({
                "message": message,
                "rows_affected": self.rows_affected,
            }),
            _ => serde_json::to_value(&self.rows).unwrap_or_default(),
        }
    }

    /// Convert to table string
    #[must_use]
    pub fn to_table(&self) -> String {
        if self.rows.is_empty() {
            return match &self.message {
                Some(message) => message.clone(),
                None => "(empty result set)".to_string(),
            };
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).map_or_else(|| "NULL".to_string(), ToString::to_string))
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut output = String::new();

        // Header
        output.push_str(format_line(self.columns.iter(), &widths).trim_end());
        output.push('\n');
        output.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        output.push('\n');

        // Rows
        for row in &cells {
            output.push_str(format_line(row.iter(), &widths).trim_end());
            output.push('\n');
        }

        output.push_str(&format!(
            "({} row{})",
            self.rows.len(),
            if self.rows.len() == 1 { "" } else { "s" }
        ));
        output
    }
}

fn format_line<'a>(values: impl Iterator<Item = &'a String>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
}
