//! In-memory table cache

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::table::Table;

/// Last-known durable snapshot of each table, refreshed after writes.
///
/// Holds whole tables; there is no eviction because tables are loaded and
/// saved whole anyway.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: HashMap<String, Table>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl TableCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached table
    pub fn get(&self, name: &str) -> Option<&Table> {
        let table = self.tables.get(name);
        if table.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        table
    }

    /// Store or replace a table snapshot
    pub fn put(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_string(), table);
    }

    /// Forget a table
    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Get cache statistics
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries: self.tables.len(),
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Schema;

    #[test]
    fn test_put_get_remove() {
        let mut cache = TableCache::new();
        assert!(cache.get("users").is_none());

        cache.put("users", Table::new(Schema::new(), None, vec![]));
        assert!(cache.contains("users"));
        assert!(cache.get("users").is_some());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);

        assert!(cache.remove("users").is_some());
        assert!(!cache.contains("users"));
    }
}
