//! Structured command descriptors consumed by the query engine

use indexmap::IndexMap;

use ledgerdb_common::types::Value;
use ledgerdb_storage::Schema;

use crate::predicate::Predicate;

/// One parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        name: String,
        schema: Schema,
        primary_key: Option<String>,
        unique_keys: Vec<String>,
    },
    CreateIndex {
        table: String,
        column: String,
    },
    DropTable {
        name: String,
    },
    Insert {
        table: String,
        /// Explicit column list; schema order when absent
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    },
    Select {
        table: String,
        columns: Option<Vec<String>>,
        predicate: Option<Predicate>,
    },
    Update {
        table: String,
        assignments: IndexMap<String, Value>,
        predicate: Option<Predicate>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
    Join {
        table1: String,
        table2: String,
        col1: String,
        col2: String,
        columns: Option<Vec<String>>,
        predicate: Option<Predicate>,
    },
    Begin,
    Commit,
    Rollback,
    ListTables,
}

impl Command {
    /// Short operation name, used for logs and metrics
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Command::CreateTable { .. } => "create_table",
            Command::CreateIndex { .. } => "create_index",
            Command::DropTable { .. } => "drop_table",
            Command::Insert { .. } => "insert",
            Command::Select { .. } => "select",
            Command::Update { .. } => "update",
            Command::Delete { .. } => "delete",
            Command::Join { .. } => "join",
            Command::Begin => "begin",
            Command::Commit => "commit",
            Command::Rollback => "rollback",
            Command::ListTables => "list_tables",
        }
    }
}
