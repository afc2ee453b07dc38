//! Row validation: type coercion against the schema and key constraints

use chrono::NaiveDate;
use indexmap::IndexMap;

use ledgerdb_common::error::{Error, QueryError, Result};
use ledgerdb_common::types::{is_reserved_column, ColumnType, Record, Value};
use ledgerdb_storage::{Schema, Table};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Coerce one value to a column type. Null passes through for every type.
/// Non-finite floats are rejected: JSON has no encoding for them.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn coerce_value(value: &Value, column_type: ColumnType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let coerced = match (column_type, value) {
        (ColumnType::Int, Value::Int(i)) => Some(Value::Int(*i)),
        (ColumnType::Int, Value::Float(f)) if f.is_finite() => Some(Value::Int(f.trunc() as i64)),
        (ColumnType::Int, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
        (ColumnType::Int, Value::Text(s)) => s.trim().parse::<i64>().ok().map(Value::Int),

        (ColumnType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
        (ColumnType::Float, Value::Float(f)) if f.is_finite() => Some(Value::Float(*f)),
        (ColumnType::Float, Value::Bool(b)) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        (ColumnType::Float, Value::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),

        (ColumnType::Text, other) => Some(Value::Text(other.to_string())),

        (ColumnType::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
        (ColumnType::Boolean, Value::Int(i)) => Some(Value::Bool(*i != 0)),
        (ColumnType::Boolean, Value::Float(f)) => Some(Value::Bool(*f != 0.0)),
        (ColumnType::Boolean, Value::Text(s)) => parse_bool(s).map(Value::Bool),

        (ColumnType::Date, Value::Date(d) | Value::Text(d)) => parse_date(d).map(Value::Date),

        _ => None,
    };

    coerced.ok_or_else(|| {
        Error::Query(QueryError::TypeMismatch {
            value: value.to_string(),
            expected: column_type,
        })
    })
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Strict `YYYY-MM-DD`, normalized to the canonical ISO form
fn parse_date(text: &str) -> Option<String> {
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|date| date.format(DATE_FORMAT).to_string())
}

/// Coerce every schema column present in `input`, in schema order.
/// Keys outside the schema are dropped; missing columns stay absent.
/// Engine-managed fields never reach the user values.
pub fn coerce_row(schema: &Schema, input: &Record) -> Result<IndexMap<String, Value>> {
    let mut row = IndexMap::with_capacity(schema.len());
    for (column, column_type) in schema {
        if is_reserved_column(column) {
            continue;
        }
        if let Some(value) = input.get(column) {
            row.insert(column.clone(), coerce_value(value, *column_type)?);
        }
    }
    Ok(row)
}

/// Coerce update assignments up front. Assignments to columns outside the
/// schema, or to engine-managed fields, are ignored.
pub fn coerce_assignments(
    schema: &Schema,
    assignments: &IndexMap<String, Value>,
) -> Result<IndexMap<String, Value>> {
    let mut coerced = IndexMap::with_capacity(assignments.len());
    for (column, value) in assignments {
        if is_reserved_column(column) {
            continue;
        }
        if let Some(column_type) = schema.get(column) {
            coerced.insert(column.clone(), coerce_value(value, *column_type)?);
        }
    }
    Ok(coerced)
}

/// Enforce primary-key and unique constraints against the active rows of
/// `table`. Soft-deleted rows never conflict.
pub fn check_constraints(table: &Table, row: &IndexMap<String, Value>) -> Result<()> {
    if let Some(primary_key) = &table.metadata.primary_key {
        if let Some(value) = row.get(primary_key) {
            if table.active_value_exists(primary_key, value) {
                return Err(Error::Query(QueryError::PrimaryKeyViolation {
                    column: primary_key.clone(),
                    value: value.to_string(),
                }));
            }
        }
    }

    for column in &table.metadata.unique_keys {
        match row.get(column) {
            Some(value) if !value.is_null() => {
                if table.active_value_exists(column, value) {
                    return Err(Error::Query(QueryError::UniqueViolation {
                        column: column.clone(),
                        value: value.to_string(),
                    }));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerdb_common::types::Row;
    use ledgerdb_common::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(Value::Int(42), ColumnType::Int, Value::Int(42))]
    #[case(Value::Text(" 42 ".into()), ColumnType::Int, Value::Int(42))]
    #[case(Value::Float(12.9), ColumnType::Int, Value::Int(12))]
    #[case(Value::Bool(true), ColumnType::Int, Value::Int(1))]
    #[case(Value::Int(3), ColumnType::Float, Value::Float(3.0))]
    #[case(Value::Text("2.5".into()), ColumnType::Float, Value::Float(2.5))]
    #[case(Value::Int(7), ColumnType::Text, Value::Text("7".into()))]
    #[case(Value::Float(1.0), ColumnType::Text, Value::Text("1.0".into()))]
    #[case(Value::Bool(false), ColumnType::Text, Value::Text("false".into()))]
    #[case(Value::Text("YES".into()), ColumnType::Boolean, Value::Bool(true))]
    #[case(Value::Text(" off ".into()), ColumnType::Boolean, Value::Bool(false))]
    #[case(Value::Int(0), ColumnType::Boolean, Value::Bool(false))]
    #[case(Value::Float(0.5), ColumnType::Boolean, Value::Bool(true))]
    #[case(Value::Text("2024-02-29".into()), ColumnType::Date, Value::Date("2024-02-29".into()))]
    #[case(Value::Date("2024-01-05".into()), ColumnType::Date, Value::Date("2024-01-05".into()))]
    #[case(Value::Null, ColumnType::Int, Value::Null)]
    #[case(Value::Null, ColumnType::Date, Value::Null)]
    fn test_coerce_accepts(
        #[case] input: Value,
        #[case] column_type: ColumnType,
        #[case] expected: Value,
    ) {
        let coerced = coerce_value(&input, column_type).unwrap();
        assert_eq!(coerced, expected);
        assert_eq!(
            std::mem::discriminant(&coerced),
            std::mem::discriminant(&expected)
        );
    }

    #[rstest]
    #[case(Value::Text("abc".into()), ColumnType::Int)]
    #[case(Value::Text("12.5".into()), ColumnType::Int)]
    #[case(Value::Date("2024-01-05".into()), ColumnType::Int)]
    #[case(Value::Text("ten".into()), ColumnType::Float)]
    #[case(Value::Text("inf".into()), ColumnType::Float)]
    #[case(Value::Text("NaN".into()), ColumnType::Float)]
    #[case(Value::Text("-infinity".into()), ColumnType::Float)]
    #[case(Value::Float(f64::INFINITY), ColumnType::Float)]
    #[case(Value::Float(f64::NAN), ColumnType::Float)]
    #[case(Value::Text("maybe".into()), ColumnType::Boolean)]
    #[case(Value::Text("2024-1-5".into()), ColumnType::Date)]
    #[case(Value::Text("2024-02-30".into()), ColumnType::Date)]
    #[case(Value::Text("2024-01-05T10:00:00".into()), ColumnType::Date)]
    #[case(Value::Int(20_240_105), ColumnType::Date)]
    fn test_coerce_rejects(#[case] input: Value, #[case] column_type: ColumnType) {
        let err = coerce_value(&input, column_type).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeError);
    }

    fn users() -> Table {
        let mut schema = Schema::new();
        schema.insert("id".to_string(), ColumnType::Int);
        schema.insert("email".to_string(), ColumnType::Text);
        Table::new(schema, Some("id".into()), vec!["email".into()])
    }

    fn values(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_coerce_row_follows_schema() {
        let mut input = Record::new();
        input.insert("email".into(), Value::Text("a@x".into()));
        input.insert("extra".into(), Value::Int(1));
        input.insert("id".into(), Value::Text("9".into()));

        let row = coerce_row(&users().schema, &input).unwrap();
        let keys: Vec<_> = row.keys().cloned().collect();
        assert_eq!(keys, vec!["id", "email"]);
        assert_eq!(row["id"], Value::Int(9));
    }

    #[test]
    fn test_coerce_assignments_ignores_unknown_columns() {
        let assignments = values(&[("email", Value::Int(5)), ("nope", Value::Int(1))]);
        let coerced = coerce_assignments(&users().schema, &assignments).unwrap();
        assert_eq!(coerced.len(), 1);
        assert_eq!(coerced["email"], Value::Text("5".into()));
    }

    #[test]
    fn test_engine_fields_never_coerced_into_values() {
        // A schema loaded from an older file may still name a reserved field
        let mut schema = users().schema;
        schema.insert("created_at".to_string(), ColumnType::Text);
        schema.insert("is_deleted".to_string(), ColumnType::Boolean);

        let mut input = Record::new();
        input.insert("id".into(), Value::Int(1));
        input.insert("created_at".into(), Value::Text("1999-01-01".into()));
        let row = coerce_row(&schema, &input).unwrap();
        assert!(!row.contains_key("created_at"));

        let assignments = values(&[("is_deleted", Value::Bool(true)), ("id", Value::Int(2))]);
        let coerced = coerce_assignments(&schema, &assignments).unwrap();
        assert_eq!(coerced.keys().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_constraints_against_active_rows() {
        let mut table = users();
        table.rows.push(Row::new(values(&[
            ("id", Value::Int(1)),
            ("email", Value::Text("a@x".into())),
        ])));

        let dup_pk = values(&[("id", Value::Int(1)), ("email", Value::Text("b@x".into()))]);
        let err = check_constraints(&table, &dup_pk).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::PrimaryKeyViolation { .. })));
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);

        let dup_unique = values(&[("id", Value::Int(2)), ("email", Value::Text("a@x".into()))]);
        let err = check_constraints(&table, &dup_unique).unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::UniqueViolation { .. })));

        let null_unique = values(&[("id", Value::Int(3)), ("email", Value::Null)]);
        assert!(check_constraints(&table, &null_unique).is_ok());

        table.rows[0].is_deleted = true;
        assert!(check_constraints(&table, &dup_pk).is_ok());
        assert!(check_constraints(&table, &dup_unique).is_ok());
    }
}
