//! DAX financial metrics data layer.
//! CSV ingestion, business-key upserts and paginated queries over either a
//! durable SQLite store or a transient in-process store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{open_repository, ConfigError, DaxConfig, StoreKind};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::envelope::{
    DaxFilter, ImportResponse, MetricsResponse, PageRequest, PaginatedResponse, PaginationMeta,
    RecordPage,
};
pub use model::record::{DaxKey, DaxRecord, DaxRecordId, DEFAULT_CURRENCY};
pub use repo::memory_repo::MemoryDaxRepository;
pub use repo::sqlite_repo::SqliteDaxRepository;
pub use repo::{DaxRepository, RepoError, RepoResult};
pub use service::dax_service::{
    DaxService, DaxServiceError, ServiceResult, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
    REQUIRED_COLUMNS,
};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
