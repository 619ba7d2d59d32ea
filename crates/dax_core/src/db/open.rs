//! Connection pool bootstrap for SQLite.
//!
//! # Responsibility
//! - Build file-backed or in-memory connection pools.
//! - Configure connection pragmas required by the durable store.
//! - Trigger schema migrations before returning a usable pool.
//!
//! # Invariants
//! - Pooled connections have `foreign_keys=ON` and a busy timeout.
//! - File-backed connections run in WAL journal mode.
//! - Returned pools have migrations fully applied.
//! - The in-memory pool holds exactly one never-expiring connection, so the
//!   database lives exactly as long as the pool.
//!
//! # See also
//! - docs/architecture/logging.md

use super::migrations::apply_migrations;
use super::{DbPool, DbResult};
use log::{error, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool bounds for file-backed databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on simultaneously open connections.
    pub max_open: u32,
    /// Connections kept open while idle. Clamped to `max_open`.
    pub max_idle: u32,
    /// How long a caller waits for a free connection.
    pub connection_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 25,
            max_idle: 5,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

/// Opens a pool over a SQLite database file and applies pending migrations.
///
/// # Side effects
/// - Creates the database file if missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, config: &PoolConfig) -> DbResult<DbPool> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file max_open={} max_idle={}",
        config.max_open, config.max_idle
    );

    let max_open = config.max_open.max(1);
    let manager = SqliteConnectionManager::file(path.as_ref()).with_init(init_file_connection);
    let pool = r2d2::Pool::builder()
        .max_size(max_open)
        .min_idle(Some(config.max_idle.min(max_open)))
        .connection_timeout(config.connection_timeout)
        .build(manager);

    finish_open(pool, "file", started_at)
}

/// Opens a single-connection in-memory database and applies migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<DbPool> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let manager = SqliteConnectionManager::memory().with_init(init_memory_connection);
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager);

    finish_open(pool, "memory", started_at)
}

fn finish_open(
    pool: Result<DbPool, r2d2::Error>,
    mode: &str,
    started_at: Instant,
) -> DbResult<DbPool> {
    let pool = match pool {
        Ok(pool) => pool,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match migrate_pool(&pool) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn migrate_pool(pool: &DbPool) -> DbResult<()> {
    let mut conn = pool.get()?;
    apply_migrations(&mut conn)
}

fn init_memory_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

fn init_file_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    init_memory_connection(conn)?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    Ok(())
}
