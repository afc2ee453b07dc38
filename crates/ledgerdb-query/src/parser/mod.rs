//! SQL statement parser
//!
//! Statements are parsed with `sqlparser` using the generic dialect and
//! converted into [`Command`]s. Only the shapes the engine executes are
//! accepted: single-table statements, one inner equality join, and a
//! `WHERE column op literal` filter.

use indexmap::IndexMap;
use sqlparser::ast::{
    self, BinaryOperator, ColumnOption, Expr, JoinConstraint, JoinOperator, ObjectName,
    ObjectType, Query, SelectItem, SetExpr, Statement, TableConstraint, TableFactor,
    TableWithJoins, UnaryOperator,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use ledgerdb_common::error::{Error, Result};
use ledgerdb_common::types::{ColumnType, Value};
use ledgerdb_storage::Schema;

use crate::command::Command;
use crate::predicate::{Operator, Predicate};

/// Statement parser
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser;

impl Parser {
    /// Create a new parser
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse a single statement into a command
    pub fn parse(&self, query: &str) -> Result<Command> {
        let dialect = GenericDialect {};
        let mut statements =
            SqlParser::parse_sql(&dialect, query).map_err(|e| Error::parse(e.to_string()))?;

        match statements.len() {
            0 => Err(Error::parse("Empty query")),
            1 => convert_statement(statements.remove(0)),
            n => Err(Error::parse(format!("Expected one statement, found {n}"))),
        }
    }
}

// =============================================================================
// Statements
// =============================================================================

fn convert_statement(statement: Statement) -> Result<Command> {
    match statement {
        Statement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => create_table(&name, columns, constraints),
        Statement::CreateIndex {
            table_name,
            columns,
            ..
        } => create_index(&table_name, &columns),
        Statement::Drop {
            object_type: ObjectType::Table,
            names,
            ..
        } => match names.as_slice() {
            [name] => Ok(Command::DropTable {
                name: object_name(name)?,
            }),
            _ => Err(Error::parse("DROP TABLE takes exactly one table")),
        },
        Statement::ShowTables { .. } => Ok(Command::ListTables),
        Statement::Insert {
            table_name,
            columns,
            source,
            ..
        } => insert(&table_name, columns, source),
        Statement::Query(query) => select(*query),
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => {
            if from.is_some() {
                return Err(Error::parse("UPDATE ... FROM is not supported"));
            }
            update(&table, &assignments, selection.as_ref())
        }
        Statement::Delete {
            from, selection, ..
        } => delete(&from, selection.as_ref()),
        Statement::StartTransaction { .. } => Ok(Command::Begin),
        Statement::Commit { .. } => Ok(Command::Commit),
        Statement::Rollback { .. } => Ok(Command::Rollback),
        other => Err(Error::parse(format!("Unsupported statement: {other}"))),
    }
}

fn create_table(
    name: &ObjectName,
    columns: Vec<ast::ColumnDef>,
    constraints: Vec<TableConstraint>,
) -> Result<Command> {
    let name = object_name(name)?;
    let mut schema = Schema::new();
    let mut primary_key = None;
    let mut unique_keys = Vec::new();

    for column in columns {
        let column_name = column.name.value;
        let column_type = column_type(&column.data_type)?;

        for option in column.options {
            match option.option {
                ColumnOption::Unique {
                    is_primary: true, ..
                } => set_primary_key(&mut primary_key, column_name.clone())?,
                ColumnOption::Unique { .. } => unique_keys.push(column_name.clone()),
                ColumnOption::Null | ColumnOption::NotNull => {}
                other => {
                    return Err(Error::parse(format!(
                        "Unsupported option on column '{column_name}': {other}"
                    )))
                }
            }
        }

        if schema.insert(column_name.clone(), column_type).is_some() {
            return Err(Error::parse(format!("Duplicate column '{column_name}'")));
        }
    }

    for constraint in constraints {
        match constraint {
            TableConstraint::Unique {
                columns,
                is_primary,
                ..
            } => {
                let [column] = columns.as_slice() else {
                    return Err(Error::parse("Composite keys are not supported"));
                };
                if is_primary {
                    set_primary_key(&mut primary_key, column.value.clone())?;
                } else {
                    unique_keys.push(column.value.clone());
                }
            }
            other => {
                return Err(Error::parse(format!(
                    "Unsupported table constraint: {other}"
                )))
            }
        }
    }

    Ok(Command::CreateTable {
        name,
        schema,
        primary_key,
        unique_keys,
    })
}

fn create_index(table: &ObjectName, columns: &[ast::OrderByExpr]) -> Result<Command> {
    let table = object_name(table)?;
    let [column] = columns else {
        return Err(Error::parse("CREATE INDEX takes exactly one column"));
    };
    let Expr::Identifier(ident) = &column.expr else {
        return Err(Error::parse(format!(
            "Index column must be a plain column, found {}",
            column.expr
        )));
    };

    Ok(Command::CreateIndex {
        table,
        column: ident.value.clone(),
    })
}

fn insert(
    table: &ObjectName,
    columns: Vec<ast::Ident>,
    source: Option<Box<Query>>,
) -> Result<Command> {
    let table = object_name(table)?;
    let Some(source) = source else {
        return Err(Error::parse("INSERT requires a VALUES list"));
    };
    let query = *source;
    let SetExpr::Values(values) = *query.body else {
        return Err(Error::parse("INSERT only supports VALUES"));
    };
    let [row] = values.rows.as_slice() else {
        return Err(Error::parse("INSERT takes exactly one row"));
    };

    let values = row.iter().map(literal).collect::<Result<Vec<_>>>()?;
    let columns = if columns.is_empty() {
        None
    } else {
        Some(columns.into_iter().map(|c| c.value).collect())
    };

    Ok(Command::Insert {
        table,
        columns,
        values,
    })
}

fn select(query: Query) -> Result<Command> {
    if query.with.is_some()
        || !query.order_by.is_empty()
        || query.limit.is_some()
        || query.offset.is_some()
    {
        return Err(Error::parse("Unsupported query clause"));
    }
    let SetExpr::Select(select) = *query.body else {
        return Err(Error::parse("Only plain SELECT queries are supported"));
    };
    let grouped = !matches!(
        &select.group_by,
        ast::GroupByExpr::Expressions(exprs) if exprs.is_empty()
    );
    if grouped || select.distinct.is_some() || select.having.is_some() {
        return Err(Error::parse("Unsupported SELECT clause"));
    }

    let columns = projection(&select.projection)?;
    let predicate = select.selection.as_ref().map(predicate).transpose()?;

    let [from] = select.from.as_slice() else {
        return Err(Error::parse("SELECT requires exactly one FROM table"));
    };
    let table = relation_name(&from.relation)?;

    match from.joins.as_slice() {
        [] => Ok(Command::Select {
            table,
            columns,
            predicate,
        }),
        [join] => {
            let table2 = relation_name(&join.relation)?;
            let JoinOperator::Inner(JoinConstraint::On(on)) = &join.join_operator else {
                return Err(Error::parse("Only INNER JOIN ... ON is supported"));
            };
            let Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } = on
            else {
                return Err(Error::parse(format!(
                    "JOIN condition must be an equality, found {on}"
                )));
            };
            let (col1, col2) =
                join_columns(&table, &table2, &column_name(left)?, &column_name(right)?)?;

            Ok(Command::Join {
                table1: table,
                table2,
                col1,
                col2,
                columns,
                predicate,
            })
        }
        _ => Err(Error::parse("Only one JOIN is supported")),
    }
}

fn update(
    table: &TableWithJoins,
    assignments: &[ast::Assignment],
    selection: Option<&Expr>,
) -> Result<Command> {
    let table = single_table(table)?;

    let mut values = IndexMap::new();
    for assignment in assignments {
        let [column] = assignment.id.as_slice() else {
            return Err(Error::parse("SET target must be a plain column"));
        };
        values.insert(column.value.clone(), literal(&assignment.value)?);
    }

    Ok(Command::Update {
        table,
        assignments: values,
        predicate: selection.map(predicate).transpose()?,
    })
}

fn delete(from: &[TableWithJoins], selection: Option<&Expr>) -> Result<Command> {
    let [table] = from else {
        return Err(Error::parse("DELETE takes exactly one table"));
    };

    Ok(Command::Delete {
        table: single_table(table)?,
        predicate: selection.map(predicate).transpose()?,
    })
}

// =============================================================================
// Expressions
// =============================================================================

fn projection(items: &[SelectItem]) -> Result<Option<Vec<String>>> {
    if let [SelectItem::Wildcard(_)] = items {
        return Ok(None);
    }

    items
        .iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(expr) => column_name(expr),
            other => Err(Error::parse(format!("Unsupported select item: {other}"))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// `WHERE column op literal`
fn predicate(expr: &Expr) -> Result<Predicate> {
    match expr {
        Expr::Nested(inner) => predicate(inner),
        Expr::BinaryOp { left, op, right } => {
            let operator = match op {
                BinaryOperator::Eq => Operator::Eq,
                BinaryOperator::NotEq => Operator::Ne,
                BinaryOperator::Lt => Operator::Lt,
                BinaryOperator::Gt => Operator::Gt,
                BinaryOperator::LtEq => Operator::Le,
                BinaryOperator::GtEq => Operator::Ge,
                BinaryOperator::And | BinaryOperator::Or => {
                    return Err(Error::parse("WHERE takes a single comparison"))
                }
                other => Operator::Other(other.to_string()),
            };
            Ok(Predicate::new(column_name(left)?, operator, literal(right)?))
        }
        // Unsupported comparison words still parse; they match no rows
        Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => {
            let word = if *negated { "NOT LIKE" } else { "LIKE" };
            Ok(Predicate::new(
                column_name(expr)?,
                Operator::Other(word.to_string()),
                literal(pattern)?,
            ))
        }
        other => Err(Error::parse(format!(
            "WHERE must compare a column with a literal, found {other}"
        ))),
    }
}

fn column_name(expr: &Expr) -> Result<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => match parts.as_slice() {
            [table, column] => Ok(format!("{}.{}", table.value, column.value)),
            _ => Err(Error::parse(format!("Invalid column reference {expr}"))),
        },
        other => Err(Error::parse(format!("Expected a column, found {other}"))),
    }
}

fn literal(expr: &Expr) -> Result<Value> {
    match expr {
        Expr::Value(value) => match value {
            ast::Value::Number(text, _) => parse_number(text, false),
            ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            ast::Value::Boolean(b) => Ok(Value::Bool(*b)),
            ast::Value::Null => Ok(Value::Null),
            other => Err(Error::parse(format!("Unsupported literal {other}"))),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr: inner,
        } => match inner.as_ref() {
            Expr::Value(ast::Value::Number(text, _)) => parse_number(text, true),
            _ => Err(Error::parse(format!("Expected a number, found {expr}"))),
        },
        // "text" is a quoted identifier to the dialect; read it as a string
        Expr::Identifier(ident) if ident.quote_style == Some('"') => {
            Ok(Value::Text(ident.value.clone()))
        }
        other => Err(Error::parse(format!("Expected a literal, found {other}"))),
    }
}

fn column_type(data_type: &ast::DataType) -> Result<ColumnType> {
    // Length and precision arguments are ignored: VARCHAR(64) is TEXT
    let rendered = data_type.to_string();
    let base = rendered.split(['(', ' ']).next().unwrap_or_default();
    ColumnType::parse(base)
}

fn object_name(name: &ObjectName) -> Result<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(Error::parse(format!(
            "Qualified table names are not supported: {name}"
        ))),
    }
}

fn relation_name(relation: &TableFactor) -> Result<String> {
    match relation {
        TableFactor::Table {
            alias: Some(alias), ..
        } => Err(Error::parse(format!(
            "Table aliases are not supported: {alias}"
        ))),
        TableFactor::Table { name, .. } => object_name(name),
        other => Err(Error::parse(format!("Unsupported table reference {other}"))),
    }
}

fn single_table(table: &TableWithJoins) -> Result<String> {
    if !table.joins.is_empty() {
        return Err(Error::parse("JOIN is only supported in SELECT"));
    }
    relation_name(&table.relation)
}

fn set_primary_key(slot: &mut Option<String>, column: String) -> Result<()> {
    if let Some(existing) = slot {
        if *existing != column {
            return Err(Error::parse("Only one PRIMARY KEY column is supported"));
        }
    }
    *slot = Some(column);
    Ok(())
}

fn parse_number(text: &str, negative: bool) -> Result<Value> {
    let signed = if negative {
        format!("-{text}")
    } else {
        text.to_string()
    };

    let is_integral = !text.contains(['.', 'e', 'E']);
    if is_integral {
        if let Ok(i) = signed.parse::<i64>() {
            return Ok(Value::Int(i));
        }
    }
    signed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
        .ok_or_else(|| Error::parse(format!("Invalid number '{signed}'")))
}

/// Resolve `ON lhs = rhs` into (left join column, right join column),
/// accepting the two sides in either order
fn join_columns(table1: &str, table2: &str, lhs: &str, rhs: &str) -> Result<(String, String)> {
    let split = |reference: &str| -> (Option<String>, String) {
        match reference.split_once('.') {
            Some((table, column)) => (Some(table.to_string()), column.to_string()),
            None => (None, reference.to_string()),
        }
    };

    let (lhs_table, lhs_column) = split(lhs);
    let (rhs_table, rhs_column) = split(rhs);

    let belongs = |qualifier: &Option<String>, table: &str| {
        qualifier.as_deref().map_or(true, |q| q == table)
    };

    if belongs(&lhs_table, table1) && belongs(&rhs_table, table2) {
        Ok((lhs_column, rhs_column))
    } else if belongs(&lhs_table, table2) && belongs(&rhs_table, table1) {
        Ok((rhs_column, lhs_column))
    } else {
        Err(Error::parse(format!(
            "JOIN condition '{lhs} = {rhs}' does not reference {table1} and {table2}"
        )))
    }
}
