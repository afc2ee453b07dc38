//! Metrics for LedgerDB
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder; without one every call is a no-op.
#![allow(clippy::cast_precision_loss)]

use metrics::{counter, histogram};

// ============================================================================
// Storage Metrics
// ============================================================================

/// Record bytes written to a table file
pub fn record_storage_write(table: &str, bytes: u64) {
    counter!("ledgerdb_storage_bytes_written_total", "table" => table.to_string())
        .increment(bytes);
}

/// Record bytes read from a table file
pub fn record_storage_read(table: &str, bytes: u64) {
    counter!("ledgerdb_storage_bytes_read_total", "table" => table.to_string())
        .increment(bytes);
}

// ============================================================================
// Query Metrics
// ============================================================================

/// Record an engine operation and its outcome
pub fn record_query(operation: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("ledgerdb_queries_total", "operation" => operation, "status" => status).increment(1);
}

/// Record rows touched by an operation
pub fn record_rows(operation: &'static str, rows: usize) {
    histogram!("ledgerdb_query_rows", "operation" => operation).record(rows as f64);
}

/// Record an index lookup
pub fn record_index_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("ledgerdb_index_lookups_total", "result" => result).increment(1);
}

/// Record which join path was taken
pub fn record_join(indexed: bool) {
    let path = if indexed { "index" } else { "nested_loop" };
    counter!("ledgerdb_joins_total", "path" => path).increment(1);
}

// ============================================================================
// Transaction Metrics
// ============================================================================

/// Record a transaction outcome ("commit" or "rollback")
pub fn record_transaction(outcome: &'static str, tables: usize) {
    counter!("ledgerdb_transactions_total", "outcome" => outcome).increment(1);
    histogram!("ledgerdb_transaction_tables", "outcome" => outcome).record(tables as f64);
}
