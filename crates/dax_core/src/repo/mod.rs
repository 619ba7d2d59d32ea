//! Repository contract for DAX records and its two backing stores.
//!
//! # Responsibility
//! - Define one storage-agnostic contract for record persistence and scans.
//! - Provide a durable SQLite store and a transient in-process store that
//!   are observably identical through that contract.
//!
//! # Invariants
//! - After any `bulk_upsert`, at most one record exists per business key.
//! - Upsert collisions keep the stored `id` and `created_at` and replace
//!   `report_type`, `value`, `currency` and `updated_at`.
//! - Later records in one batch win over earlier records with the same key.
//! - Scans use [`listing_order`](crate::model::record::listing_order); a page
//!   past the data is empty, never an error.
//!
//! # See also
//! - docs/architecture/dax-data-layer.md

use crate::db::DbError;
use crate::model::envelope::{DaxFilter, PageRequest, RecordPage};
use crate::model::record::{DaxRecord, DaxRecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod memory_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error. None of these are business-rule violations.
#[derive(Debug)]
pub enum RepoError {
    /// Storage or connectivity failure.
    Db(DbError),
    /// A direct insert collided with an existing id or business key.
    Conflict(String),
    /// Persisted state could not be decoded.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "conflicting dax record: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted dax data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Conflict(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<r2d2::Error> for RepoError {
    fn from(value: r2d2::Error) -> Self {
        Self::Db(DbError::Pool(value))
    }
}

/// Storage contract shared by the durable and transient stores.
pub trait DaxRepository {
    /// Inserts one record, assigning an id when absent.
    ///
    /// Writes the stored id and timestamps back into `record`. Does not
    /// upsert: a business-key collision is reported as `Conflict`.
    fn create(&self, record: &mut DaxRecord) -> RepoResult<DaxRecordId>;
    /// Inserts or updates every record by business key. Empty input is a no-op.
    fn bulk_upsert(&self, records: &[DaxRecord]) -> RepoResult<()>;
    /// Returns one page of all records plus the total count.
    fn find_all(&self, page: PageRequest) -> RepoResult<RecordPage>;
    /// Returns one page of matching records plus the match count.
    fn find_by_filters(&self, filter: &DaxFilter, page: PageRequest) -> RepoResult<RecordPage>;
    /// Returns sorted, distinct metric names for `ticker`.
    fn get_metrics(&self, ticker: &str) -> RepoResult<Vec<String>>;
    /// Removes every record.
    fn delete_all(&self) -> RepoResult<()>;
    fn count(&self) -> RepoResult<u64>;
}

/// Identifies a record in conflict messages.
pub(crate) fn describe_record(record: &DaxRecord) -> String {
    let id = record
        .id
        .map_or_else(|| "<unassigned>".to_string(), |id| id.to_string());
    format!(
        "id={id} company=`{}` ticker=`{}` metric=`{}` year={}",
        record.company, record.ticker, record.metric, record.year
    )
}

macro_rules! forward_dax_repository {
    ($param:ident => $($wrapper:ty),+ $(,)?) => {
        $(
            impl<$param: DaxRepository + ?Sized> DaxRepository for $wrapper {
                fn create(&self, record: &mut DaxRecord) -> RepoResult<DaxRecordId> {
                    (**self).create(record)
                }

                fn bulk_upsert(&self, records: &[DaxRecord]) -> RepoResult<()> {
                    (**self).bulk_upsert(records)
                }

                fn find_all(&self, page: PageRequest) -> RepoResult<RecordPage> {
                    (**self).find_all(page)
                }

                fn find_by_filters(
                    &self,
                    filter: &DaxFilter,
                    page: PageRequest,
                ) -> RepoResult<RecordPage> {
                    (**self).find_by_filters(filter, page)
                }

                fn get_metrics(&self, ticker: &str) -> RepoResult<Vec<String>> {
                    (**self).get_metrics(ticker)
                }

                fn delete_all(&self) -> RepoResult<()> {
                    (**self).delete_all()
                }

                fn count(&self) -> RepoResult<u64> {
                    (**self).count()
                }
            }
        )+
    };
}

forward_dax_repository!(R => &R, Box<R>, Arc<R>);
