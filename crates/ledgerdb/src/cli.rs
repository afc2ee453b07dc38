//! Interactive shell

use std::io::{BufRead, Write};

use anyhow::Result;
use ledgerdb_query::QueryEngine;

const PROMPT: &str = "ledgerdb> ";

const HELP: &str = "\
Statements (one per line, trailing ';' optional):
  CREATE TABLE t (col TYPE [PRIMARY KEY] [UNIQUE], ...)
  CREATE INDEX ON t (col)          DROP TABLE t
  INSERT INTO t [(cols)] VALUES (...)
  SELECT cols FROM t [WHERE col op value]
  SELECT cols FROM t1 JOIN t2 ON t1.a = t2.b [WHERE ...]
  UPDATE t SET col = value, ... [WHERE ...]
  DELETE FROM t [WHERE ...]
  BEGIN | COMMIT | ROLLBACK | SHOW TABLES
Shell commands: HELP, EXIT, QUIT";

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Table,
    Json,
}

/// Run one statement and render its result
pub fn run_statement(engine: &mut QueryEngine, sql: &str, format: Format) -> Result<String> {
    let result = engine.execute_sql(sql)?;
    Ok(match format {
        Format::Table => result.to_table(),
        Format::Json => serde_json::to_string_pretty(&result.to_json())?,
    })
}

/// Read statements from `input` until EOF or `EXIT`. Statement errors are
/// reported and the loop continues.
pub fn run_shell<R: BufRead, W: Write>(
    engine: &mut QueryEngine,
    input: R,
    output: &mut W,
) -> Result<()> {
    writeln!(output, "LedgerDB {} (type HELP for help)", env!("CARGO_PKG_VERSION"))?;
    write!(output, "{PROMPT}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        let statement = line.trim();

        match statement.to_ascii_uppercase().trim_end_matches(';') {
            "" => {}
            "EXIT" | "QUIT" => break,
            "HELP" => writeln!(output, "{HELP}")?,
            _ => match run_statement(engine, statement, Format::Table) {
                Ok(rendered) => writeln!(output, "{rendered}")?,
                Err(e) => writeln!(output, "Error: {e}")?,
            },
        }

        write!(output, "{PROMPT}")?;
        output.flush()?;
    }

    if engine.in_transaction() {
        writeln!(output, "Warning: uncommitted transaction discarded")?;
    }
    Ok(())
}
