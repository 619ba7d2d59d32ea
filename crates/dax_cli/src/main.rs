//! Command-line entry point for the DAX data layer.
//!
//! # Responsibility
//! - Map subcommands onto `DaxService` operations.
//! - Print every response as pretty JSON on stdout.
//!
//! # Invariants
//! - Configuration comes from `DAX_*` environment keys; flags only override.
//! - Logs go to rolling files when `DAX_LOG_DIR` is set, otherwise stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dax_core::{init_logging, open_repository, DaxConfig, DaxService, StoreKind};
use flexi_logger::{Logger, LoggerHandle};
use log::info;
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about = "DAX financial metrics store")]
struct Cli {
    /// Store backend: sqlite or memory (overrides DAX_STORE)
    #[arg(long, global = true)]
    store: Option<StoreKind>,

    /// SQLite database file (overrides DAX_DB_PATH)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import records from a CSV file, upserting on the business key
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// List all records, one page at a time
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// List records matching a ticker and/or year
    Query {
        #[arg(long, default_value = "")]
        ticker: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Distinct metric names reported for a ticker
    Metrics {
        #[arg(long)]
        ticker: String,
    },

    /// Number of stored records
    Count,

    /// Remove every stored record
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DaxConfig::from_env()?;
    if let Some(store) = cli.store {
        config.store = store;
    }
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let _stderr_logger = start_logging(&config)?;

    let repo = open_repository(&config)
        .with_context(|| format!("opening {:?} store", config.store))?;
    let service = DaxService::new(repo);

    match cli.command {
        Command::Import { file } => {
            let reader = File::open(&file)
                .with_context(|| format!("opening CSV file `{}`", file.display()))?;
            print_json(&service.import_csv(reader)?)?;
        }
        Command::List { page, limit } => {
            print_json(&service.get_all(page, limit)?)?;
        }
        Command::Query {
            ticker,
            year,
            page,
            limit,
        } => {
            print_json(&service.get_by_filters(&ticker, year, page, limit)?)?;
        }
        Command::Metrics { ticker } => {
            print_json(&service.get_metrics(&ticker)?)?;
        }
        Command::Count => {
            print_json(&serde_json::json!({ "count": service.count()? }))?;
        }
        Command::Reset => {
            service.repository().delete_all()?;
            info!("event=dax_reset module=cli status=ok");
            print_json(&serde_json::json!({ "message": "All records deleted" }))?;
        }
    }

    Ok(())
}

/// Starts file logging when a directory is configured, stderr otherwise.
///
/// The returned handle must stay alive for stderr logging to keep flushing.
fn start_logging(config: &DaxConfig) -> Result<Option<LoggerHandle>> {
    match &config.log_dir {
        Some(dir) => {
            let dir = dir
                .to_str()
                .ok_or_else(|| anyhow!("log directory `{}` is not UTF-8", dir.display()))?;
            init_logging(config.log_level, dir).map_err(|err| anyhow!(err))?;
            Ok(None)
        }
        None => {
            let handle = Logger::try_with_str(config.log_level)?
                .log_to_stderr()
                .start()?;
            Ok(Some(handle))
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
