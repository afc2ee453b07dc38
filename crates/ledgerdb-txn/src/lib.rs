//! Transaction support
//!
//! A single active transaction at a time, staged in memory:
//! - Copy-on-write table buffer, materialized on first touch
//! - `Idle → Active → (Committing | RollingBack) → Idle` state machine
//!
//! The buffer never writes to storage itself. Commit hands the staged tables
//! back to the caller, which persists them and then calls [`TransactionBuffer::finish`].

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use indexmap::IndexMap;
use tracing::{debug, info};

use ledgerdb_common::error::{Result, TransactionError};
use ledgerdb_storage::Table;

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Active,
    Committing,
    RollingBack,
}

/// Staging area for the one active transaction
#[derive(Debug)]
pub struct TransactionBuffer {
    state: TxnState,
    /// Identifier of the current transaction, if any
    current: Option<u64>,
    /// Staged copies, in first-touch order
    tables: IndexMap<String, Table>,
    next_id: u64,
}

impl TransactionBuffer {
    /// Create an idle buffer
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TxnState::Idle,
            current: None,
            tables: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Begin a new transaction
    pub fn begin(&mut self) -> Result<u64> {
        if self.state != TxnState::Idle {
            return Err(TransactionError::AlreadyActive.into());
        }

        let id = self.next_id;
        self.next_id += 1;
        self.tables.clear();
        self.current = Some(id);
        self.state = TxnState::Active;

        info!(txn_id = id, "Transaction started");
        Ok(id)
    }

    /// Check if a transaction is active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    #[must_use]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Identifier of the active transaction
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.current
    }

    /// Staged copy of a table, if this transaction has touched it
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Whether this transaction has a staged copy of `name`
    #[must_use]
    pub fn is_staged(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Staged copy of `name`, materialized through `load` on first touch
    pub fn stage<F>(&mut self, name: &str, load: F) -> Result<&mut Table>
    where
        F: FnOnce() -> Result<Table>,
    {
        if !self.is_active() {
            return Err(TransactionError::NotActive.into());
        }

        if !self.tables.contains_key(name) {
            let table = load()?;
            debug!(table = name, rows = table.rows.len(), "Staging table");
            self.tables.insert(name.to_string(), table);
        }

        match self.tables.get_mut(name) {
            Some(table) => Ok(table),
            None => Err(TransactionError::NotActive.into()),
        }
    }

    /// Move to `Committing` and take the staged tables, each with an
    /// up-to-date `row_count`. The caller persists them, then calls
    /// [`finish`](Self::finish) whatever the outcome.
    pub fn begin_commit(&mut self) -> Result<Vec<(String, Table)>> {
        if !self.is_active() {
            return Err(TransactionError::NotActive.into());
        }

        self.state = TxnState::Committing;
        let staged: Vec<(String, Table)> = self
            .tables
            .drain(..)
            .map(|(name, mut table)| {
                table.refresh_row_count();
                (name, table)
            })
            .collect();

        debug!(txn_id = ?self.current, tables = staged.len(), "Committing transaction");
        Ok(staged)
    }

    /// Return to `Idle`, dropping anything still staged
    pub fn finish(&mut self) {
        if let Some(id) = self.current.take() {
            info!(txn_id = id, "Transaction finished");
        }
        self.tables.clear();
        self.state = TxnState::Idle;
    }

    /// Discard the staged tables. Returns how many were discarded.
    pub fn rollback(&mut self) -> Result<usize> {
        if !self.is_active() {
            return Err(TransactionError::NotActive.into());
        }

        self.state = TxnState::RollingBack;
        let discarded = self.tables.len();
        info!(txn_id = ?self.current, tables = discarded, "Rolling back transaction");
        self.finish();
        Ok(discarded)
    }
}

impl Default for TransactionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use ledgerdb_common::types::{ColumnType, Row, Value};
    use ledgerdb_common::{Error, ErrorKind};
    use ledgerdb_storage::Schema;

    fn empty_table() -> Table {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), ColumnType::Int);
        Table::new(schema, Some("id".into()), vec![])
    }

    fn push_row(table: &mut Table, id: i64) {
        let mut values = Map::new();
        values.insert("id".to_string(), Value::Int(id));
        table.rows.push(Row::new(values));
    }

    #[test]
    fn test_state_machine() {
        let mut txn = TransactionBuffer::new();
        assert_eq!(txn.state(), TxnState::Idle);
        assert!(txn.id().is_none());

        let id = txn.begin().unwrap();
        assert!(txn.is_active());
        assert_eq!(txn.id(), Some(id));

        assert_eq!(txn.begin().unwrap_err().kind(), ErrorKind::InvalidState);

        txn.rollback().unwrap();
        assert_eq!(txn.state(), TxnState::Idle);
        assert_eq!(txn.rollback().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(txn.begin_commit().unwrap_err().kind(), ErrorKind::InvalidState);

        let next = txn.begin().unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_stage_requires_active() {
        let mut txn = TransactionBuffer::new();
        let err = txn.stage("users", || Ok(empty_table())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_stage_loads_once() {
        let mut txn = TransactionBuffer::new();
        txn.begin().unwrap();

        let table = txn.stage("users", || Ok(empty_table())).unwrap();
        push_row(table, 1);

        // second touch must not reload and lose the staged row
        let table = txn
            .stage("users", || panic!("table reloaded while staged"))
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert!(txn.is_staged("users"));
        assert!(!txn.is_staged("accounts"));
    }

    #[test]
    fn test_stage_propagates_load_error() {
        let mut txn = TransactionBuffer::new();
        txn.begin().unwrap();

        let err = txn
            .stage("ghost", || Err(Error::table_not_found("ghost")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!txn.is_staged("ghost"));
        assert!(txn.is_active());
    }

    #[test]
    fn test_commit_hands_back_tables_with_row_count() {
        let mut txn = TransactionBuffer::new();
        txn.begin().unwrap();

        let users = txn.stage("users", || Ok(empty_table())).unwrap();
        push_row(users, 1);
        push_row(users, 2);
        txn.stage("accounts", || Ok(empty_table())).unwrap();

        let staged = txn.begin_commit().unwrap();
        assert_eq!(txn.state(), TxnState::Committing);
        assert_eq!(staged.len(), 2);
        assert_eq!(staged[0].0, "users");
        assert_eq!(staged[0].1.metadata.row_count, 2);
        assert_eq!(staged[1].0, "accounts");

        txn.finish();
        assert_eq!(txn.state(), TxnState::Idle);
        assert!(txn.get("users").is_none());
    }

    #[test]
    fn test_begin_clears_residual_buffer() {
        let mut txn = TransactionBuffer::new();
        txn.begin().unwrap();
        txn.stage("users", || Ok(empty_table())).unwrap();
        assert_eq!(txn.rollback().unwrap(), 1);

        txn.begin().unwrap();
        assert!(!txn.is_staged("users"));
        assert!(txn.get("users").is_none());
    }
}
