//! Durable DAX repository backed by SQLite.
//!
//! # Responsibility
//! - Persist records in the `dax` table through a bounded connection pool.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - The unique index `idx_dax_unique` enforces the business key.
//! - `bulk_upsert` is all-or-nothing: one immediate transaction per call.
//! - Read paths reject undecodable rows instead of masking them.
//! - A page and its total count come from one read transaction.
//!
//! # See also
//! - docs/architecture/dax-data-layer.md

use crate::db::DbPool;
use crate::model::envelope::{DaxFilter, PageRequest, RecordPage};
use crate::model::record::{DaxRecord, DaxRecordId, LISTING_ORDER_SQL};
use crate::repo::{describe_record, DaxRepository, RepoError, RepoResult};
use chrono::Utc;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row, TransactionBehavior};
use uuid::Uuid;

const DAX_SELECT_SQL: &str = "SELECT
    id,
    company,
    ticker,
    report_type,
    metric,
    year,
    value,
    currency,
    created_at,
    updated_at
FROM dax";

const DAX_INSERT_SQL: &str = "INSERT INTO dax (
    id,
    company,
    ticker,
    report_type,
    metric,
    year,
    value,
    currency,
    created_at,
    updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

/// SQLite-backed DAX repository.
///
/// Cloning shares the underlying pool.
#[derive(Clone)]
pub struct SqliteDaxRepository {
    pool: DbPool,
}

impl SqliteDaxRepository {
    /// Wraps a migrated pool from [`crate::db::open_db`] or
    /// [`crate::db::open_db_in_memory`].
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl DaxRepository for SqliteDaxRepository {
    fn create(&self, record: &mut DaxRecord) -> RepoResult<DaxRecordId> {
        let mut stamped = record.stamped(Utc::now());
        let id = *stamped.id.get_or_insert_with(Uuid::new_v4);

        let conn = self.pool.get()?;
        insert_record(&conn, DAX_INSERT_SQL, &stamped)?;

        *record = stamped;
        Ok(id)
    }

    fn bulk_upsert(&self, records: &[DaxRecord]) -> RepoResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let upsert_sql = format!(
            "{DAX_INSERT_SQL}
             ON CONFLICT (company, ticker, metric, year) DO UPDATE SET
                report_type = excluded.report_type,
                value = excluded.value,
                currency = excluded.currency,
                updated_at = excluded.updated_at"
        );

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for record in records {
            insert_record(&tx, &upsert_sql, &record.stamped(now))?;
        }
        tx.commit()?;

        debug!(
            "event=dax_bulk_upsert module=repo store=sqlite status=ok records={}",
            records.len()
        );
        Ok(())
    }

    fn find_all(&self, page: PageRequest) -> RepoResult<RecordPage> {
        self.find_by_filters(&DaxFilter::default(), page)
    }

    fn find_by_filters(&self, filter: &DaxFilter, page: PageRequest) -> RepoResult<RecordPage> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(ticker) = filter.ticker() {
            where_sql.push_str(" AND ticker = ?");
            bind_values.push(Value::Text(ticker.to_string()));
        }

        if let Some(year) = filter.year {
            where_sql.push_str(" AND year = ?");
            bind_values.push(Value::Integer(i64::from(year)));
        }

        // COUNT and page share one snapshot.
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let total_count: u64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM dax{where_sql}"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!("{DAX_SELECT_SQL}{where_sql} ORDER BY {LISTING_ORDER_SQL} LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(page.limit)));
        bind_values.push(Value::Integer(
            i64::try_from(page.offset()).unwrap_or(i64::MAX),
        ));

        let records = {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(parse_dax_row(row)?);
            }
            records
        };
        tx.commit()?;

        Ok(RecordPage {
            records,
            total_count,
        })
    }

    fn get_metrics(&self, ticker: &str) -> RepoResult<Vec<String>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT metric
             FROM dax
             WHERE ticker = ?1
             ORDER BY metric ASC;",
        )?;

        let metrics = stmt
            .query_map([ticker], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metrics)
    }

    fn delete_all(&self) -> RepoResult<()> {
        let conn = self.pool.get()?;
        let removed = conn.execute("DELETE FROM dax;", [])?;
        debug!("event=dax_delete_all module=repo store=sqlite status=ok removed={removed}");
        Ok(())
    }

    fn count(&self) -> RepoResult<u64> {
        let conn = self.pool.get()?;
        let count = conn.query_row("SELECT COUNT(*) FROM dax;", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn insert_record(conn: &Connection, sql: &str, record: &DaxRecord) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(sql)?;
    let result = stmt.execute(params![
        record.id.map(|id| id.to_string()),
        record.company.as_str(),
        record.ticker.as_str(),
        record.report_type.as_str(),
        record.metric.as_str(),
        record.year,
        record.value,
        record.currency.as_str(),
        record.created_at,
        record.updated_at,
    ]);

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(RepoError::Conflict(describe_record(record)))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_dax_row(row: &Row<'_>) -> RepoResult<DaxRecord> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in dax.id"))
    })?;

    Ok(DaxRecord {
        id: Some(id),
        company: row.get("company")?,
        ticker: row.get("ticker")?,
        report_type: row.get("report_type")?,
        metric: row.get("metric")?,
        year: row.get("year")?,
        value: row.get("value")?,
        currency: row.get("currency")?,
        created_at: Some(row.get("created_at")?),
        updated_at: Some(row.get("updated_at")?),
    })
}
