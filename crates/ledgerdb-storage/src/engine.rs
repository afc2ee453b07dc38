//! Table store: one JSON file per table, whole-table load and save

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use ledgerdb_common::error::{Error, Result, StorageError};
use ledgerdb_common::types::{is_reserved_column, Position, Row};

use crate::table::{Schema, Table};
use crate::StorageOptions;

const TABLE_EXTENSION: &str = "json";

/// Durable per-table storage.
///
/// Every write replaces the table file as a unit: the new contents go to a
/// temporary file in the same directory, which is synced and renamed over
/// the old one. Readers see the previous or the new file, never a mix.
#[derive(Debug, Clone)]
pub struct TableStore {
    data_dir: PathBuf,
    pretty: bool,
}

impl TableStore {
    /// Open a table store, creating the data directory if needed
    pub fn open(options: &StorageOptions) -> Result<Self> {
        info!("Opening table store at {}", options.data_dir.display());
        fs::create_dir_all(&options.data_dir)?;

        Ok(Self {
            data_dir: options.data_dir.clone(),
            pretty: options.pretty,
        })
    }

    /// Directory holding the table files
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.{TABLE_EXTENSION}"))
    }

    /// Check if a table exists
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        is_valid_name(name) && self.table_path(name).is_file()
    }

    /// Create a new, empty table
    pub fn create(
        &self,
        name: &str,
        schema: Schema,
        primary_key: Option<String>,
        unique_keys: Vec<String>,
    ) -> Result<Table> {
        validate_name(name)?;
        if let Some(column) = schema.keys().find(|c| is_reserved_column(c)) {
            return Err(StorageError::ReservedColumn(column.clone()).into());
        }
        if self.exists(name) {
            return Err(StorageError::TableExists(name.to_string()).into());
        }

        info!("Creating table: {}", name);
        let mut table = Table::new(schema, primary_key, unique_keys);
        self.save(name, &mut table)?;
        Ok(table)
    }

    /// Load a full table snapshot, deleted rows included
    pub fn load(&self, name: &str) -> Result<Table> {
        validate_name(name)?;
        let path = self.table_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::table_not_found(name));
            }
            Err(e) => return Err(e.into()),
        };
        ledgerdb_common::metrics::record_storage_read(name, bytes.len() as u64);

        let mut table: Table = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Storage(StorageError::CorruptData(format!("table '{name}': {e}")))
        })?;
        table.normalize();

        debug!(table = name, rows = table.rows.len(), "Loaded table");
        Ok(table)
    }

    /// Overwrite a table's durable record, recomputing `row_count` first
    pub fn save(&self, name: &str, table: &mut Table) -> Result<()> {
        validate_name(name)?;
        table.refresh_row_count();

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(table)?
        } else {
            serde_json::to_vec(table)?
        };

        let mut tmp = NamedTempFile::new_in(&self.data_dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.table_path(name)).map_err(|e| Error::Io(e.error))?;

        ledgerdb_common::metrics::record_storage_write(name, bytes.len() as u64);
        debug!(table = name, rows = table.rows.len(), bytes = bytes.len(), "Saved table");
        Ok(())
    }

    /// Load, append one row, save. Returns the new row's position.
    pub fn append_row(&self, name: &str, row: Row) -> Result<Position> {
        let mut table = self.load(name)?;
        table.rows.push(row);
        let position = table.rows.len() - 1;
        self.save(name, &mut table)?;
        Ok(position)
    }

    /// Load, substitute the row sequence, save
    pub fn replace_rows(&self, name: &str, rows: Vec<Row>) -> Result<()> {
        let mut table = self.load(name)?;
        table.rows = rows;
        self.save(name, &mut table)
    }

    /// Permanently remove a table file. Returns whether anything was removed.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        validate_name(name)?;
        match fs::remove_file(self.table_path(name)) {
            Ok(()) => {
                info!("Dropped table: {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all persisted tables, sorted
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == TABLE_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if is_valid_name(stem) {
                        tables.push(stem.to_string());
                    }
                }
            }
        }
        tables.sort();
        Ok(tables)
    }
}

/// Identifier rule for table names: `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()).into())
    }
}
