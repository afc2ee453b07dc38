//! Configuration loading

use std::path::Path;

use anyhow::{Context, Result};
use ledgerdb_common::config::Config;

/// Load configuration from file, falling back to defaults when the file is
/// missing. `data_dir` overrides the configured storage directory.
pub fn load(path: &str, data_dir: Option<String>) -> Result<Config> {
    let path = Path::new(path);

    if !path.exists() {
        return Ok(data_dir.map_or_else(Config::default, Config::with_data_dir));
    }

    let mut config =
        Config::load(path).with_context(|| format!("loading {}", path.display()))?;
    if let Some(data_dir) = data_dir {
        config.storage.data_dir = data_dir;
    }
    Ok(config)
}
