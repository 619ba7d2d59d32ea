#![allow(dead_code)]

use dax_core::db::{open_db, open_db_in_memory, PoolConfig};
use dax_core::{DaxRecord, DaxRepository, MemoryDaxRepository, SqliteDaxRepository};
use tempfile::TempDir;

pub const TICKERS: [&str; 4] = ["ADS", "BMW", "SAP", "SIE"];
pub const METRICS: [&str; 3] = ["EBITDA", "Net Income", "Revenue"];

pub fn record(company: &str, ticker: &str, metric: &str, year: i32, value: f64) -> DaxRecord {
    DaxRecord::new(company, ticker, "income", metric, year, Some(value), "EUR")
}

pub fn memory_store() -> (MemoryDaxRepository, ()) {
    (MemoryDaxRepository::new(), ())
}

pub fn sqlite_memory_store() -> (SqliteDaxRepository, ()) {
    (SqliteDaxRepository::new(open_db_in_memory().unwrap()), ())
}

pub fn sqlite_file_store() -> (SqliteDaxRepository, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = PoolConfig {
        max_open: 4,
        max_idle: 1,
        ..PoolConfig::default()
    };
    let pool = open_db(dir.path().join("dax.sqlite3"), &config).unwrap();
    (SqliteDaxRepository::new(pool), dir)
}

/// Builds `count` records with distinct business keys spread over
/// tickers, metrics and years.
pub fn grid(count: usize) -> Vec<DaxRecord> {
    (0..count)
        .map(|index| {
            let ticker = TICKERS[index % TICKERS.len()];
            let metric = METRICS[(index / TICKERS.len()) % METRICS.len()];
            let year = 2020 + (index / (TICKERS.len() * METRICS.len())) as i32;
            record(
                &format!("{ticker} Company"),
                ticker,
                metric,
                year,
                index as f64 * 1000.0,
            )
        })
        .collect()
}

pub fn seed<R: DaxRepository>(repo: &R, count: usize) -> Vec<DaxRecord> {
    let records = grid(count);
    repo.bulk_upsert(&records).unwrap();
    records
}
