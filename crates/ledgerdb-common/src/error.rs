//! Error types for LedgerDB
//!
//! Provides a unified error type hierarchy for the entire system. Every
//! variant maps onto a coarse [`ErrorKind`] so callers (including the
//! transaction layer) can branch on the failure class without matching
//! the full tree.

use thiserror::Error;

use crate::types::ColumnType;

/// Result type alias using LedgerDB's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for LedgerDB
#[derive(Error, Debug)]
pub enum Error {
    // Storage Errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // Query Errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    // Transaction Errors
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Invalid table name: '{0}'")]
    InvalidName(String),

    #[error("Column name '{0}' is reserved")]
    ReservedColumn(String),

    #[error("Corrupt data: {0}")]
    CorruptData(String),
}

/// Query-related errors
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Cannot convert '{value}' to {expected}")]
    TypeMismatch { value: String, expected: ColumnType },

    #[error("Unsupported column type: {0}")]
    UnknownColumnType(String),

    #[error("Primary key '{value}' already exists in column '{column}'")]
    PrimaryKeyViolation { column: String, value: String },

    #[error("Unique constraint violation on '{column}': '{value}' already exists")]
    UniqueViolation { column: String, value: String },

    #[error("Expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction already in progress. Use COMMIT or ROLLBACK first.")]
    AlreadyActive,

    #[error("No transaction in progress")]
    NotActive,
}

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Table or name collision
    AlreadyExists,
    /// Missing table, or missing column for index creation
    NotFound,
    /// Value coercion failure
    TypeError,
    /// Primary-key or unique-key collision
    ConstraintViolation,
    /// Transaction protocol misuse
    InvalidState,
    /// Malformed input: parse errors, bad names, arity mismatches
    InvalidInput,
    Io,
    Serialization,
    Config,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(e) => match e {
                StorageError::TableExists(_) => ErrorKind::AlreadyExists,
                StorageError::TableNotFound(_) | StorageError::ColumnNotFound { .. } => {
                    ErrorKind::NotFound
                }
                StorageError::InvalidName(_) | StorageError::ReservedColumn(_) => {
                    ErrorKind::InvalidInput
                }
                StorageError::CorruptData(_) => ErrorKind::Serialization,
            },
            Error::Query(e) => match e {
                QueryError::TypeMismatch { .. } | QueryError::UnknownColumnType(_) => {
                    ErrorKind::TypeError
                }
                QueryError::PrimaryKeyViolation { .. } | QueryError::UniqueViolation { .. } => {
                    ErrorKind::ConstraintViolation
                }
                QueryError::ArityMismatch { .. } | QueryError::ParseError(_) => {
                    ErrorKind::InvalidInput
                }
            },
            Error::Transaction(_) => ErrorKind::InvalidState,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Io,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Shorthand for a missing table.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::Storage(StorageError::TableNotFound(name.into()))
    }

    /// Shorthand for a missing column.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::Storage(StorageError::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        })
    }

    /// Shorthand for a parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Query(QueryError::ParseError(message.into()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
