//! Query engine implementation

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use ledgerdb_common::error::{Error, QueryError, Result, TransactionError};
use ledgerdb_common::metrics;
use ledgerdb_common::types::{Position, Record, Row, Value};
use ledgerdb_common::Config;
use ledgerdb_storage::{IndexManager, Schema, StorageOptions, Table, TableCache, TableStore};
use ledgerdb_txn::TransactionBuffer;

use crate::analyzer;
use crate::command::Command;
use crate::executor::{self, JoinSide};
use crate::parser::Parser;
use crate::predicate::Predicate;
use crate::QueryResult;

/// Main query engine.
///
/// Owns all mutable engine state: the table store, the index manager, the
/// table cache and the transaction buffer. One instance per data directory;
/// share it across threads only behind a single lock.
pub struct QueryEngine {
    /// Configuration
    config: Config,
    /// Durable tables
    store: TableStore,
    /// Hash indexes over durable row positions
    indexes: IndexManager,
    /// Last saved snapshot of each table
    cache: TableCache,
    /// Staged tables of the active transaction
    txn: TransactionBuffer,
    /// Statement parser
    parser: Parser,
}

impl QueryEngine {
    /// Open the engine over the configured data directory, rebuilding the
    /// automatic indexes of every existing table
    pub fn open(config: &Config) -> Result<Self> {
        info!("Initializing query engine");

        let store = TableStore::open(&StorageOptions::from(&config.storage))?;
        let mut engine = Self {
            config: config.clone(),
            store,
            indexes: IndexManager::new(),
            cache: TableCache::new(),
            txn: TransactionBuffer::new(),
            parser: Parser::new(),
        };

        for name in engine.store.list_tables()? {
            match engine.store.load(&name) {
                Ok(table) => {
                    engine.auto_index(&name, &table);
                    engine.cache.put(&name, table);
                }
                Err(e) => warn!(table = %name, error = %e, "Skipping unreadable table"),
            }
        }

        info!(
            data_dir = %engine.store.data_dir().display(),
            tables = engine.cache.stats().entries,
            "Query engine ready"
        );
        Ok(engine)
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Index manager, for inspection
    #[must_use]
    pub fn indexes(&self) -> &IndexManager {
        &self.indexes
    }

    /// Whether a transaction is active
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn.is_active()
    }

    /// Names of all persisted tables, sorted
    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.store.list_tables()
    }

    // ========================================================================
    // DDL
    // ========================================================================

    /// Create a table
    pub fn create_table(
        &mut self,
        name: &str,
        schema: Schema,
        primary_key: Option<String>,
        unique_keys: Vec<String>,
    ) -> Result<()> {
        for column in primary_key.iter().chain(&unique_keys) {
            if !schema.contains_key(column) {
                return Err(Error::column_not_found(name, column.as_str()));
            }
        }

        let table = self.store.create(name, schema, primary_key, unique_keys)?;
        // A new table has no rows to build from
        for column in &self.config.index.auto_index_columns {
            if table.has_column(column) {
                self.indexes.create(name, column);
            }
        }
        self.cache.put(name, table);
        metrics::record_query("create_table", true);
        Ok(())
    }

    /// Create (or rebuild) an index on an existing column
    pub fn create_index(&mut self, table: &str, column: &str) -> Result<()> {
        self.ensure_cached(table)?;
        let Some(snapshot) = self.cache.get(table) else {
            return Err(Error::table_not_found(table));
        };
        if !snapshot.has_column(column) {
            return Err(Error::column_not_found(table, column));
        }

        self.indexes.build(table, column, &snapshot.rows);
        info!(table, column, "Created index");
        Ok(())
    }

    /// Permanently remove a table with its indexes
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.txn.is_active() {
            return Err(TransactionError::AlreadyActive.into());
        }
        if !self.store.drop_table(name)? {
            return Err(Error::table_not_found(name));
        }

        self.cache.remove(name);
        self.indexes.drop_table(name);
        Ok(())
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Insert one row. Returns its position in the table's row sequence.
    pub fn insert(&mut self, table: &str, input: &Record) -> Result<Position> {
        let result = self.insert_row(table, input);
        metrics::record_query("insert", result.is_ok());
        result
    }

    fn insert_row(&mut self, table: &str, input: &Record) -> Result<Position> {
        if self.txn.is_active() {
            let staged = self.staged(table)?;
            let values = analyzer::coerce_row(&staged.schema, input)?;
            analyzer::check_constraints(staged, &values)?;
            staged.rows.push(Row::new(values));
            staged.refresh_row_count();
            let position = staged.rows.len() - 1;
            debug!(table, position, "Staged insert");
            return Ok(position);
        }

        self.ensure_cached(table)?;
        let values = {
            let current = self.view(table)?;
            let values = analyzer::coerce_row(&current.schema, input)?;
            analyzer::check_constraints(current, &values)?;
            values
        };

        let row = Row::new(values);
        let position = self.store.append_row(table, row.clone())?;
        for (column, value) in row.values {
            self.indexes.add(table, &column, position, value);
        }
        self.reload(table)?;

        debug!(table, position, "Inserted row");
        Ok(position)
    }

    /// Active rows matching `predicate`, projected to `columns`
    pub fn select(
        &mut self,
        table: &str,
        columns: Option<&[String]>,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Record>> {
        self.prepare(table)?;
        let snapshot = self.view(table)?;
        let rows: Vec<Record> = executor::filter_rows(snapshot, predicate)
            .map(|(_, row)| executor::project_row(row, columns))
            .collect();

        metrics::record_query("select", true);
        metrics::record_rows("select", rows.len());
        Ok(rows)
    }

    /// Every row of the table, soft-deleted ones included
    pub fn scan(&mut self, table: &str) -> Result<Vec<Record>> {
        self.prepare(table)?;
        let snapshot = self.view(table)?;
        Ok(snapshot.rows.iter().map(Row::to_record).collect())
    }

    /// Update matching active rows. Returns the number of rows matched.
    pub fn update(
        &mut self,
        table: &str,
        assignments: &IndexMap<String, Value>,
        predicate: Option<&Predicate>,
    ) -> Result<usize> {
        let result = self.update_rows(table, assignments, predicate);
        metrics::record_query("update", result.is_ok());
        result
    }

    fn update_rows(
        &mut self,
        table: &str,
        assignments: &IndexMap<String, Value>,
        predicate: Option<&Predicate>,
    ) -> Result<usize> {
        if self.txn.is_active() {
            let staged = self.staged(table)?;
            let assignments = analyzer::coerce_assignments(&staged.schema, assignments)?;
            let changes = executor::apply_assignments(staged, &assignments, predicate);
            debug!(table, rows = changes.len(), "Staged update");
            return Ok(changes.len());
        }

        let mut working = self.store.load(table)?;
        let assignments = analyzer::coerce_assignments(&working.schema, assignments)?;
        let changes = executor::apply_assignments(&mut working, &assignments, predicate);
        if changes.is_empty() {
            return Ok(0);
        }

        self.store.replace_rows(table, working.rows)?;
        for (position, previous) in &changes {
            for (column, old) in previous {
                if let Some(new) = assignments.get(column) {
                    self.indexes.update(table, column, *position, old, new.clone());
                }
            }
        }
        self.reload(table)?;

        metrics::record_rows("update", changes.len());
        debug!(table, rows = changes.len(), "Updated rows");
        Ok(changes.len())
    }

    /// Soft-delete matching active rows. Returns the number newly deleted.
    pub fn delete(&mut self, table: &str, predicate: Option<&Predicate>) -> Result<usize> {
        let result = self.delete_rows(table, predicate);
        metrics::record_query("delete", result.is_ok());
        result
    }

    fn delete_rows(&mut self, table: &str, predicate: Option<&Predicate>) -> Result<usize> {
        if self.txn.is_active() {
            let staged = self.staged(table)?;
            let positions = executor::mark_deleted(staged, predicate);
            debug!(table, rows = positions.len(), "Staged delete");
            return Ok(positions.len());
        }

        let mut working = self.store.load(table)?;
        let positions = executor::mark_deleted(&mut working, predicate);
        if positions.is_empty() {
            return Ok(0);
        }

        self.store.replace_rows(table, working.rows)?;
        for column in self.indexes.columns(table) {
            for position in &positions {
                self.indexes.remove(table, &column, *position);
            }
        }
        self.reload(table)?;

        metrics::record_rows("delete", positions.len());
        debug!(table, rows = positions.len(), "Deleted rows");
        Ok(positions.len())
    }

    /// Inner equality join of `table1.col1` with `table2.col2`
    pub fn join(
        &mut self,
        table1: &str,
        table2: &str,
        col1: &str,
        col2: &str,
        columns: Option<&[String]>,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Record>> {
        self.prepare(table1)?;
        self.prepare(table2)?;

        // the index addresses durable positions; a staged copy may differ
        let use_index = self.indexes.has(table2, col2) && !self.txn.is_staged(table2);

        let left = JoinSide {
            name: table1,
            table: self.view(table1)?,
            column: col1,
        };
        let right = JoinSide {
            name: table2,
            table: self.view(table2)?,
            column: col2,
        };
        let rows = executor::join(
            &left,
            &right,
            use_index.then_some(&self.indexes),
            columns,
            predicate,
        );

        metrics::record_join(use_index);
        metrics::record_query("join", true);
        metrics::record_rows("join", rows.len());
        Ok(rows)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction
    pub fn begin(&mut self) -> Result<u64> {
        self.txn.begin()
    }

    /// Persist every staged table. The buffer is cleared and the engine
    /// returns to idle even when a write fails; tables written before the
    /// failure stay written. Returns the number of tables written.
    pub fn commit(&mut self) -> Result<usize> {
        let staged = self.txn.begin_commit()?;
        let mut written = 0;
        let mut outcome = Ok(());

        for (name, mut table) in staged {
            if let Err(e) = self.store.save(&name, &mut table) {
                warn!(table = %name, error = %e, "Commit stopped; remaining tables not written");
                outcome = Err(e);
                break;
            }
            self.indexes.rebuild_table(&name, &table.rows);
            self.cache.put(&name, table);
            written += 1;
        }

        self.txn.finish();
        metrics::record_transaction("commit", written);
        outcome?;

        info!(tables = written, "Transaction committed");
        Ok(written)
    }

    /// Discard every staged change
    pub fn rollback(&mut self) -> Result<usize> {
        let discarded = self.txn.rollback()?;
        metrics::record_transaction("rollback", discarded);
        Ok(discarded)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Parse and execute one statement
    pub fn execute_sql(&mut self, query: &str) -> Result<QueryResult> {
        debug!("Executing query: {}", query);
        let command = self.parser.parse(query)?;
        self.execute(command)
    }

    /// Execute a command descriptor
    pub fn execute(&mut self, command: Command) -> Result<QueryResult> {
        let started = Instant::now();
        let operation = command.operation();

        let result = self.dispatch(command);
        if let Err(e) = &result {
            debug!(operation, error = %e, "Command failed");
        }

        result.map(|mut result| {
            result.execution_time_ms =
                u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            result
        })
    }

    fn dispatch(&mut self, command: Command) -> Result<QueryResult> {
        match command {
            Command::CreateTable {
                name,
                schema,
                primary_key,
                unique_keys,
            } => {
                self.create_table(&name, schema, primary_key, unique_keys)?;
                Ok(QueryResult::message(format!("Table '{name}' created")))
            }
            Command::CreateIndex { table, column } => {
                self.create_index(&table, &column)?;
                Ok(QueryResult::message(format!("Index created on {table}({column})")))
            }
            Command::DropTable { name } => {
                self.drop_table(&name)?;
                Ok(QueryResult::message(format!("Table '{name}' dropped")))
            }
            Command::Insert {
                table,
                columns,
                values,
            } => {
                let record = self.bind_values(&table, columns, values)?;
                self.insert(&table, &record)?;
                Ok(QueryResult::affected(1, "1 row inserted"))
            }
            Command::Select {
                table,
                columns,
                predicate,
            } => {
                let rows = self.select(&table, columns.as_deref(), predicate.as_ref())?;
                Ok(QueryResult::new(rows))
            }
            Command::Update {
                table,
                assignments,
                predicate,
            } => {
                let count = self.update(&table, &assignments, predicate.as_ref())?;
                Ok(QueryResult::affected(count, format!("{count} row(s) updated")))
            }
            Command::Delete { table, predicate } => {
                let count = self.delete(&table, predicate.as_ref())?;
                Ok(QueryResult::affected(count, format!("{count} row(s) deleted")))
            }
            Command::Join {
                table1,
                table2,
                col1,
                col2,
                columns,
                predicate,
            } => {
                let rows = self.join(
                    &table1,
                    &table2,
                    &col1,
                    &col2,
                    columns.as_deref(),
                    predicate.as_ref(),
                )?;
                Ok(QueryResult::new(rows))
            }
            Command::Begin => {
                self.begin()?;
                Ok(QueryResult::message("Transaction started"))
            }
            Command::Commit => {
                let tables = self.commit()?;
                Ok(QueryResult::affected(tables, "Transaction committed"))
            }
            Command::Rollback => {
                self.rollback()?;
                Ok(QueryResult::message("Transaction rolled back"))
            }
            Command::ListTables => {
                let rows = self
                    .list_tables()?
                    .into_iter()
                    .map(|name| {
                        let mut record = Record::new();
                        record.insert("table".to_string(), Value::Text(name));
                        record
                    })
                    .collect();
                Ok(QueryResult::new(rows))
            }
        }
    }

    /// Pair insert values with their columns; schema order when no column
    /// list is given
    fn bind_values(
        &mut self,
        table: &str,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    ) -> Result<Record> {
        let columns = match columns {
            Some(columns) => columns,
            None => {
                self.prepare(table)?;
                self.view(table)?.schema.keys().cloned().collect()
            }
        };

        if columns.len() != values.len() {
            return Err(Error::Query(QueryError::ArityMismatch {
                expected: columns.len(),
                actual: values.len(),
            }));
        }
        Ok(columns.into_iter().zip(values).collect())
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Register and build the configured automatic indexes present in `table`
    fn auto_index(&mut self, name: &str, table: &Table) {
        for column in &self.config.index.auto_index_columns {
            if table.has_column(column) {
                self.indexes.build(name, column, &table.rows);
            }
        }
    }

    fn ensure_cached(&mut self, name: &str) -> Result<()> {
        if !self.cache.contains(name) {
            let table = self.store.load(name)?;
            self.cache.put(name, table);
        }
        Ok(())
    }

    /// Make `name` readable through [`view`](Self::view)
    fn prepare(&mut self, name: &str) -> Result<()> {
        if self.txn.is_staged(name) {
            Ok(())
        } else {
            self.ensure_cached(name)
        }
    }

    /// The staged copy when the active transaction has one, else the cached
    /// durable snapshot
    fn view(&self, name: &str) -> Result<&Table> {
        self.txn
            .get(name)
            .or_else(|| self.cache.get(name))
            .ok_or_else(|| Error::table_not_found(name))
    }

    /// Staged copy of `name`, materialized from the durable snapshot
    fn staged(&mut self, name: &str) -> Result<&mut Table> {
        let store = &self.store;
        let cache = &self.cache;
        self.txn.stage(name, || match cache.get(name) {
            Some(table) => Ok(table.clone()),
            None => store.load(name),
        })
    }

    /// Refresh the cached snapshot from storage
    fn reload(&mut self, name: &str) -> Result<()> {
        let table = self.store.load(name)?;
        self.cache.put(name, table);
        Ok(())
    }
}
