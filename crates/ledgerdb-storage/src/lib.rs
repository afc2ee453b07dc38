//! LedgerDB Storage
//!
//! Durable per-table storage and the structures kept beside it:
//! - One JSON document per table, replaced atomically on every write
//! - Hash indexes mapping a column value to row positions
//! - A whole-table cache of the last saved snapshot

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod index;

mod engine;
mod table;

pub use cache::TableCache;
pub use engine::{is_valid_name, TableStore};
pub use index::{HashIndex, IndexManager};
pub use table::{Schema, Table, TableMetadata};

use std::path::PathBuf;

use ledgerdb_common::config::StorageConfig;

/// Table store options
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Directory holding the table files
    pub data_dir: PathBuf,
    /// Pretty-print table files
    pub pretty: bool,
}

impl From<StorageConfig> for StorageOptions {
    fn from(config: StorageConfig) -> Self {
        Self {
            data_dir: PathBuf::from(config.data_dir),
            pretty: config.pretty,
        }
    }
}

impl From<&StorageConfig> for StorageOptions {
    fn from(config: &StorageConfig) -> Self {
        Self::from(config.clone())
    }
}
