//! Hash indexes keyed by (table, column)

use std::collections::{HashMap, HashSet};

use tracing::debug;

use ledgerdb_common::types::{Position, Row, Value};

/// Value-to-positions hash index over one column.
///
/// Keeps a reverse map from position to indexed value so a position can be
/// removed without the caller supplying its old value. Nulls are never
/// indexed.
#[derive(Debug, Default, Clone)]
pub struct HashIndex {
    entries: HashMap<Value, HashSet<Position>>,
    reverse: HashMap<Position, Value>,
}

impl HashIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear and repopulate from a full row sequence
    pub fn build<'a>(&mut self, column: &str, rows: impl IntoIterator<Item = &'a Row>) {
        self.entries.clear();
        self.reverse.clear();
        for (position, row) in rows.into_iter().enumerate() {
            if let Some(value) = row.get(column) {
                self.add(position, value.clone());
            }
        }
    }

    /// Index `position` under `value`; no-op for null
    pub fn add(&mut self, position: Position, value: Value) {
        if value.is_null() {
            return;
        }
        if let Some(previous) = self.reverse.get(&position) {
            if *previous != value {
                let previous = previous.clone();
                self.discard(&previous, position);
            }
        }
        self.entries.entry(value.clone()).or_default().insert(position);
        self.reverse.insert(position, value);
    }

    /// Drop `position` from the index; no-op if never indexed
    pub fn remove(&mut self, position: Position) {
        if let Some(value) = self.reverse.remove(&position) {
            self.discard(&value, position);
        }
    }

    /// Move `position` from `old` to `new`
    pub fn update(&mut self, position: Position, old: &Value, new: Value) {
        self.discard(old, position);
        self.reverse.remove(&position);
        self.add(position, new);
    }

    /// Positions holding `value`
    #[must_use]
    pub fn find(&self, value: &Value) -> HashSet<Position> {
        self.entries.get(value).cloned().unwrap_or_default()
    }

    /// Number of distinct indexed values
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn discard(&mut self, value: &Value, position: Position) {
        if let Some(positions) = self.entries.get_mut(value) {
            positions.remove(&position);
            if positions.is_empty() {
                self.entries.remove(value);
            }
        }
    }
}

/// All indexes of the engine, addressed by table then column
#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: HashMap<String, HashMap<String, HashIndex>>,
}

impl IndexManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty index, replacing any existing one
    pub fn create(&mut self, table: &str, column: &str) {
        debug!(table, column, "Registering index");
        self.indexes
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), HashIndex::new());
    }

    /// Clear and repopulate an index from a table's full row sequence.
    /// Registers the index if it doesn't exist yet.
    pub fn build(&mut self, table: &str, column: &str, rows: &[Row]) {
        let index = self
            .indexes
            .entry(table.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default();
        index.build(column, rows);
        debug!(table, column, values = index.len(), "Built index");
    }

    /// Rebuild every index registered on `table`
    pub fn rebuild_table(&mut self, table: &str, rows: &[Row]) {
        if let Some(columns) = self.indexes.get_mut(table) {
            for (column, index) in columns.iter_mut() {
                index.build(column, rows);
            }
        }
    }

    pub fn add(&mut self, table: &str, column: &str, position: Position, value: Value) {
        if let Some(index) = self.get_mut(table, column) {
            index.add(position, value);
        }
    }

    pub fn remove(&mut self, table: &str, column: &str, position: Position) {
        if let Some(index) = self.get_mut(table, column) {
            index.remove(position);
        }
    }

    pub fn update(
        &mut self,
        table: &str,
        column: &str,
        position: Position,
        old: &Value,
        new: Value,
    ) {
        if let Some(index) = self.get_mut(table, column) {
            index.update(position, old, new);
        }
    }

    /// Positions in `table` whose `column` holds `value`; empty if unindexed
    #[must_use]
    pub fn find(&self, table: &str, column: &str, value: &Value) -> HashSet<Position> {
        let found = self
            .indexes
            .get(table)
            .and_then(|columns| columns.get(column))
            .map(|index| index.find(value))
            .unwrap_or_default();
        ledgerdb_common::metrics::record_index_lookup(!found.is_empty());
        found
    }

    #[must_use]
    pub fn has(&self, table: &str, column: &str) -> bool {
        self.indexes
            .get(table)
            .is_some_and(|columns| columns.contains_key(column))
    }

    /// Indexed columns of `table`, sorted
    #[must_use]
    pub fn columns(&self, table: &str) -> Vec<String> {
        let mut columns: Vec<String> = self
            .indexes
            .get(table)
            .map(|columns| columns.keys().cloned().collect())
            .unwrap_or_default();
        columns.sort();
        columns
    }

    /// Discard every index of `table`
    pub fn drop_table(&mut self, table: &str) {
        self.indexes.remove(table);
    }

    fn get_mut(&mut self, table: &str, column: &str) -> Option<&mut HashIndex> {
        self.indexes.get_mut(table)?.get_mut(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn row(user_id: Value) -> Row {
        let mut values = IndexMap::new();
        values.insert("user_id".to_string(), user_id);
        Row::new(values)
    }

    fn positions(items: &[Position]) -> HashSet<Position> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_build_uses_ordinal_positions() {
        let rows = vec![
            row(Value::Int(1)),
            row(Value::Int(2)),
            row(Value::Null),
            row(Value::Int(1)),
        ];

        let mut manager = IndexManager::new();
        manager.build("txns", "user_id", &rows);

        assert!(manager.has("txns", "user_id"));
        assert_eq!(manager.find("txns", "user_id", &Value::Int(1)), positions(&[0, 3]));
        assert_eq!(manager.find("txns", "user_id", &Value::Int(2)), positions(&[1]));
        assert!(manager.find("txns", "user_id", &Value::Null).is_empty());
    }

    #[test]
    fn test_null_add_and_unknown_remove_are_noops() {
        let mut index = HashIndex::new();
        index.add(0, Value::Null);
        assert!(index.is_empty());

        index.add(1, Value::Text("a".into()));
        index.remove(42);
        assert_eq!(index.find(&Value::Text("a".into())), positions(&[1]));
    }

    #[test]
    fn test_remove_drops_empty_sets() {
        let mut index = HashIndex::new();
        index.add(0, Value::Int(7));
        index.remove(0);
        assert!(index.is_empty());
        assert!(index.find(&Value::Int(7)).is_empty());
    }

    #[test]
    fn test_update_moves_position() {
        let mut manager = IndexManager::new();
        manager.create("txns", "user_id");
        manager.add("txns", "user_id", 0, Value::Int(1));
        manager.add("txns", "user_id", 1, Value::Int(1));

        manager.update("txns", "user_id", 0, &Value::Int(1), Value::Int(5));

        assert_eq!(manager.find("txns", "user_id", &Value::Int(1)), positions(&[1]));
        assert_eq!(manager.find("txns", "user_id", &Value::Int(5)), positions(&[0]));

        // the reverse map follows the update
        manager.remove("txns", "user_id", 0);
        assert!(manager.find("txns", "user_id", &Value::Int(5)).is_empty());
    }

    #[test]
    fn test_numeric_kinds_share_buckets() {
        let mut index = HashIndex::new();
        index.add(3, Value::Float(2.0));
        assert_eq!(index.find(&Value::Int(2)), positions(&[3]));
    }

    #[test]
    fn test_create_twice_resets() {
        let mut manager = IndexManager::new();
        manager.create("txns", "user_id");
        manager.add("txns", "user_id", 0, Value::Int(1));
        manager.create("txns", "user_id");
        assert!(manager.has("txns", "user_id"));
        assert!(manager.find("txns", "user_id", &Value::Int(1)).is_empty());
    }

    #[test]
    fn test_columns_and_drop_table() {
        let mut manager = IndexManager::new();
        manager.create("txns", "user_id");
        manager.create("txns", "account");
        manager.create("users", "id");

        assert_eq!(manager.columns("txns"), vec!["account", "user_id"]);
        manager.drop_table("txns");
        assert!(manager.columns("txns").is_empty());
        assert!(manager.has("users", "id"));
    }

    #[test]
    fn test_operations_on_unregistered_index() {
        let mut manager = IndexManager::new();
        manager.add("ghost", "c", 0, Value::Int(1));
        manager.remove("ghost", "c", 0);
        assert!(!manager.has("ghost", "c"));
        assert!(manager.find("ghost", "c", &Value::Int(1)).is_empty());
    }
}
