//! LedgerDB - embedded relational store
//!
//! Single binary that provides:
//! - An interactive SQL-like shell
//! - One-shot statement execution with table or JSON output
//! - Table listing for a data directory

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledgerdb_common::config::LoggingConfig;
use ledgerdb_query::QueryEngine;

mod cli;
mod config;

use cli::Format;

#[derive(Parser)]
#[command(name = "ledgerdb")]
#[command(author, version, about = "LedgerDB - embedded relational store", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ledgerdb.toml", global = true)]
    config: String,

    /// Data directory, overriding the configuration file
    #[arg(short, long, env = "LEDGERDB_DATA_DIR", global = true)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell
    Shell,

    /// Execute a single statement
    Exec {
        /// Statement to run
        #[arg(short, long)]
        query: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// List the tables in the data directory
    Tables,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("ledgerdb={}", logging.level)),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);

    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!(e))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(&cli.config, cli.data_dir)?;
    init_tracing(&config.logging)?;

    let mut engine = QueryEngine::open(&config)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            info!(data_dir = %config.storage.data_dir, "Starting shell");
            let stdin = io::stdin();
            cli::run_shell(&mut engine, stdin.lock(), &mut io::stdout())?;
        }

        Commands::Exec { query, format } => {
            println!("{}", cli::run_statement(&mut engine, &query, format)?);
        }

        Commands::Tables => {
            for table in engine.list_tables()? {
                println!("{table}");
            }
        }
    }

    Ok(())
}
