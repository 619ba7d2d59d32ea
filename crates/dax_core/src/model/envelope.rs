//! Query inputs and response envelopes.

use crate::model::record::DaxRecord;
use serde::{Deserialize, Serialize};

/// One-indexed page request as seen by repositories.
///
/// Repositories trust these values; normalization happens in the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Optional exact-match filters for record scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaxFilter {
    pub ticker: Option<String>,
    pub year: Option<i32>,
}

impl DaxFilter {
    /// Builds a filter where an empty ticker means "any ticker".
    pub fn new(ticker: &str, year: Option<i32>) -> Self {
        Self {
            ticker: (!ticker.is_empty()).then(|| ticker.to_string()),
            year,
        }
    }

    /// Effective ticker constraint; `Some("")` is treated as absent.
    pub fn ticker(&self) -> Option<&str> {
        self.ticker.as_deref().filter(|ticker| !ticker.is_empty())
    }

    /// Returns whether `record` passes every present constraint.
    pub fn matches(&self, record: &DaxRecord) -> bool {
        if let Some(ticker) = self.ticker() {
            if record.ticker != ticker {
                return false;
            }
        }
        if let Some(year) = self.year {
            if record.year != year {
                return false;
            }
        }
        true
    }
}

/// One page of records plus the unsliced match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    pub records: Vec<DaxRecord>,
    pub total_count: u64,
}

/// Paginated list returned by read operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse {
    pub data: Vec<DaxRecord>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    /// Computes page metadata; `total_pages = ceil(total_count / limit)`.
    pub fn new(request: PageRequest, total_count: u64) -> Self {
        let limit = u64::from(request.limit.max(1));
        Self {
            page: request.page,
            limit: request.limit,
            total_count,
            total_pages: total_count.div_ceil(limit),
        }
    }
}

/// Distinct metric names reported for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub ticker: String,
    pub metrics: Vec<String>,
}

/// Summary of a successful CSV import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub records_imported: usize,
    pub message: String,
}
