//! Row pipelines: filtering, projection and inner equality joins

use indexmap::IndexMap;
use tracing::debug;

use ledgerdb_common::types::{Record, Row, Value, IS_DELETED};
use ledgerdb_storage::{IndexManager, Table};

use crate::predicate::Predicate;

/// Active rows of `table` matching `predicate`, each with its position
pub fn filter_rows<'a>(
    table: &'a Table,
    predicate: Option<&'a Predicate>,
) -> impl Iterator<Item = (usize, &'a Row)> + 'a {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.is_active())
        .filter(move |(_, row)| predicate.map_or(true, |p| p.matches(*row)))
}

/// Previous values of the assigned columns of one updated row
pub type RowChange = (usize, Vec<(String, Value)>);

/// Apply already-coerced assignments to every active row matching
/// `predicate`. Returns, per matched row, its position and the values the
/// assignments replaced (null where the column was absent).
pub fn apply_assignments(
    table: &mut Table,
    assignments: &IndexMap<String, Value>,
    predicate: Option<&Predicate>,
) -> Vec<RowChange> {
    let mut changes = Vec::new();
    for (position, row) in table.rows.iter_mut().enumerate() {
        if !row.is_active() || !predicate.map_or(true, |p| p.matches(&*row)) {
            continue;
        }

        let previous = assignments
            .iter()
            .map(|(column, value)| {
                let old = row
                    .values
                    .insert(column.clone(), value.clone())
                    .unwrap_or(Value::Null);
                (column.clone(), old)
            })
            .collect();
        changes.push((position, previous));
    }
    changes
}

/// Soft-delete every active row matching `predicate`. Returns the positions
/// newly marked.
pub fn mark_deleted(table: &mut Table, predicate: Option<&Predicate>) -> Vec<usize> {
    let mut positions = Vec::new();
    for (position, row) in table.rows.iter_mut().enumerate() {
        if row.is_active() && predicate.map_or(true, |p| p.matches(&*row)) {
            row.is_deleted = true;
            positions.push(position);
        }
    }
    positions
}

/// Project a stored row. Without a column list the full row is returned,
/// engine fields included; requested columns the row lacks become null.
#[must_use]
pub fn project_row(row: &Row, columns: Option<&[String]>) -> Record {
    match columns {
        None => row.to_record(),
        Some(columns) => columns
            .iter()
            .map(|column| {
                let value = row.field(column).map_or(Value::Null, |v| v.into_owned());
                (column.clone(), value)
            })
            .collect(),
    }
}

/// One side of a join
pub struct JoinSide<'a> {
    pub name: &'a str,
    pub table: &'a Table,
    pub column: &'a str,
}

/// Inner equality join.
///
/// With `index` set, rows of the right side are found through the hash index
/// on its join column; positions are visited in ascending order and resolved
/// against the full row sequence, skipping deleted rows. Without it every
/// active pair is compared. Null join values never match on either path.
#[must_use]
pub fn join(
    left: &JoinSide<'_>,
    right: &JoinSide<'_>,
    index: Option<&IndexManager>,
    columns: Option<&[String]>,
    predicate: Option<&Predicate>,
) -> Vec<Record> {
    let mut merged = Vec::new();

    for row1 in left.table.active_rows() {
        let Some(key) = row1.get(left.column).filter(|v| !v.is_null()) else {
            continue;
        };

        match index {
            Some(indexes) => {
                let mut positions: Vec<usize> = indexes
                    .find(right.name, right.column, key)
                    .into_iter()
                    .collect();
                positions.sort_unstable();

                for position in positions {
                    match right.table.rows.get(position) {
                        Some(row2) if row2.is_active() => {
                            merged.push(merge_rows(left.name, row1, right.name, row2));
                        }
                        _ => {}
                    }
                }
            }
            None => {
                for row2 in right.table.active_rows() {
                    if row2.get(right.column).is_some_and(|v| v == key) {
                        merged.push(merge_rows(left.name, row1, right.name, row2));
                    }
                }
            }
        }
    }

    debug!(
        left = left.name,
        right = right.name,
        indexed = index.is_some(),
        matched = merged.len(),
        "Join matched rows"
    );

    merged
        .into_iter()
        .filter(|record| predicate.map_or(true, |p| p.matches(record)))
        .map(|record| match columns {
            Some(columns) => project_record(record, columns),
            None => record,
        })
        .collect()
}

/// Combine two rows into one record with `table.column` keys, leaving out
/// the soft-delete flag of both sides
#[must_use]
pub fn merge_rows(name1: &str, row1: &Row, name2: &str, row2: &Row) -> Record {
    let mut record = Record::with_capacity(row1.values.len() + row2.values.len() + 2);
    for (name, row) in [(name1, row1), (name2, row2)] {
        for (column, value) in row.to_record() {
            if column != IS_DELETED {
                record.insert(format!("{name}.{column}"), value);
            }
        }
    }
    record
}

/// Keep only the requested keys that exist, in request order
fn project_record(mut record: Record, columns: &[String]) -> Record {
    columns
        .iter()
        .filter_map(|column| {
            record
                .swap_remove(column)
                .map(|value| (column.clone(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdb_common::types::{ColumnType, CREATED_AT};
    use ledgerdb_storage::Schema;

    use crate::predicate::Operator;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let values: IndexMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        Row::new(values)
    }

    fn users() -> Table {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), ColumnType::Int);
        schema.insert("name".to_string(), ColumnType::Text);
        let mut table = Table::new(schema, Some("id".into()), vec![]);
        table.rows = vec![
            row(&[("id", Value::Int(1)), ("name", Value::Text("ana".into()))]),
            row(&[("id", Value::Int(2)), ("name", Value::Text("bo".into()))]),
            row(&[("id", Value::Null), ("name", Value::Text("ghost".into()))]),
        ];
        table
    }

    fn txns() -> Table {
        let mut schema = Schema::new();
        schema.insert("user_id".to_string(), ColumnType::Int);
        schema.insert("amount".to_string(), ColumnType::Float);
        let mut table = Table::new(schema, None, vec![]);
        table.rows = vec![
            row(&[("user_id", Value::Int(1)), ("amount", Value::Float(10.0))]),
            row(&[("user_id", Value::Int(2)), ("amount", Value::Float(20.0))]),
            row(&[("user_id", Value::Int(1)), ("amount", Value::Float(30.0))]),
            row(&[("user_id", Value::Null), ("amount", Value::Float(40.0))]),
        ];
        table.rows[1].is_deleted = true;
        table
    }

    fn run(users: &Table, txns: &Table, use_index: bool) -> Vec<Record> {
        let mut indexes = IndexManager::new();
        indexes.build("txns", "user_id", &txns.rows);

        let left = JoinSide { name: "users", table: users, column: "id" };
        let right = JoinSide { name: "txns", table: txns, column: "user_id" };
        join(&left, &right, use_index.then_some(&indexes), None, None)
    }

    #[test]
    fn test_index_and_nested_loop_agree() {
        let (users, txns) = (users(), txns());
        let indexed = run(&users, &txns, true);
        let nested = run(&users, &txns, false);
        assert_eq!(indexed, nested);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed[0]["txns.amount"], Value::Float(10.0));
        assert_eq!(indexed[1]["txns.amount"], Value::Float(30.0));
    }

    #[test]
    fn test_merged_keys() {
        let merged = run(&users(), &txns(), false);
        let record = &merged[0];
        assert!(record.contains_key("users.id"));
        assert!(record.contains_key("users.name"));
        assert!(record.contains_key(&format!("txns.{CREATED_AT}")));
        assert!(!record.contains_key("users.is_deleted"));
        assert!(!record.contains_key("txns.is_deleted"));
    }

    #[test]
    fn test_join_predicate_and_projection() {
        let predicate = Predicate::new("txns.amount", Operator::Gt, 15);
        let users = users();
        let txns = txns();
        let columns = vec!["users.name".to_string(), "missing".to_string()];

        let left = JoinSide { name: "users", table: &users, column: "id" };
        let right = JoinSide { name: "txns", table: &txns, column: "user_id" };
        let rows = join(&left, &right, None, Some(&columns), Some(&predicate));

        assert_eq!(rows.len(), 1);
        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["users.name"]);
        assert_eq!(rows[0]["users.name"], Value::Text("ana".into()));
    }

    #[test]
    fn test_stale_index_positions_are_rechecked() {
        let users = users();
        let mut txns = txns();
        let mut indexes = IndexManager::new();
        indexes.build("txns", "user_id", &txns.rows);

        // deleted after the index was built, index left untouched
        txns.rows[2].is_deleted = true;

        let left = JoinSide { name: "users", table: &users, column: "id" };
        let right = JoinSide { name: "txns", table: &txns, column: "user_id" };
        let rows = join(&left, &right, Some(&indexes), None, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["txns.amount"], Value::Float(10.0));
    }

    #[test]
    fn test_project_row() {
        let stored = row(&[("id", Value::Int(1)), ("name", Value::Text("ana".into()))]);
        let columns = vec!["name".to_string(), "age".to_string()];
        let projected = project_row(&stored, Some(&columns));
        assert_eq!(projected["name"], Value::Text("ana".into()));
        assert_eq!(projected["age"], Value::Null);

        let full = project_row(&stored, None);
        assert!(full.contains_key(IS_DELETED));
        assert!(full.contains_key(CREATED_AT));
    }

    #[test]
    fn test_filter_rows_skips_deleted() {
        let txns = txns();
        let positions: Vec<usize> = filter_rows(&txns, None).map(|(p, _)| p).collect();
        assert_eq!(positions, vec![0, 2, 3]);

        let predicate = Predicate::eq("user_id", 1);
        let positions: Vec<usize> = filter_rows(&txns, Some(&predicate)).map(|(p, _)| p).collect();
        assert_eq!(positions, vec![0, 2]);
    }
    #[test]
    fn test_apply_assignments_reports_previous_values() {
        let mut txns = txns();
        let mut assignments = IndexMap::new();
        assignments.insert("amount".to_string(), Value::Float(99.0));
        assignments.insert("memo".to_string(), Value::Text("fixed".into()));

        let predicate = Predicate::eq("user_id", 1);
        let changes = apply_assignments(&mut txns, &assignments, Some(&predicate));

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].0, 0);
        assert_eq!(
            changes[0].1,
            vec![
                ("amount".to_string(), Value::Float(10.0)),
                ("memo".to_string(), Value::Null),
            ]
        );
        assert_eq!(txns.rows[2].get("amount"), Some(&Value::Float(99.0)));
        // deleted row untouched
        assert_eq!(txns.rows[1].get("amount"), Some(&Value::Float(20.0)));
    }

    #[test]
    fn test_mark_deleted_only_counts_active_rows() {
        let mut txns = txns();
        let positions = mark_deleted(&mut txns, None);
        assert_eq!(positions, vec![0, 2, 3]);
        assert!(txns.rows.iter().all(|row| row.is_deleted));
        assert_eq!(txns.rows.len(), 4);
        assert!(mark_deleted(&mut txns, None).is_empty());
    }
}
