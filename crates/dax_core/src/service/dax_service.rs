//! DAX import and query service.
//!
//! # Responsibility
//! - Parse, validate and normalize CSV uploads into one bulk upsert.
//! - Normalize pagination input and shape repository results into envelopes.
//!
//! # Invariants
//! - Validation errors are raised before any repository call.
//! - One import maps to exactly one `bulk_upsert` call; the first bad row
//!   aborts the whole import.
//! - Effective page is `>= 1`; effective limit is in `1..=100`, otherwise 10.
//! - Repository failures are propagated, never retried.
//!
//! # See also
//! - docs/architecture/dax-data-layer.md

use crate::model::envelope::{
    DaxFilter, ImportResponse, MetricsResponse, PageRequest, PaginatedResponse, PaginationMeta,
    RecordPage,
};
use crate::model::record::DaxRecord;
use crate::repo::{DaxRepository, RepoError};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;
use std::time::Instant;

/// Limit applied when the caller's limit is out of range.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Largest accepted page size.
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Header columns every import must carry, matched case-insensitively.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "company",
    "ticker",
    "report_type",
    "metric",
    "year",
    "value",
    "currency",
];

/// Service error for DAX use-cases.
#[derive(Debug)]
pub enum DaxServiceError {
    /// The CSV stream is empty.
    MissingHeader,
    /// The header row could not be read.
    ReadHeader(csv::Error),
    /// Required header columns are absent, in `REQUIRED_COLUMNS` order.
    MissingFields(Vec<String>),
    /// A data row could not be read from the stream.
    ReadRow { row: usize, source: csv::Error },
    /// A data row has too few columns.
    MalformedRow { row: usize, message: String },
    InvalidYear { row: usize, value: String },
    InvalidValue { row: usize, value: String },
    /// A valid header was followed by no data rows.
    NoRecords,
    TickerRequired,
    /// Parsed rows could not be persisted.
    Import(RepoError),
    /// Read-path persistence failure.
    Repo(RepoError),
}

impl DaxServiceError {
    /// Returns whether the caller can fix this error by changing its input.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::ReadHeader(err) => !err.is_io_error(),
            Self::ReadRow { source, .. } => !source.is_io_error(),
            Self::Import(_) | Self::Repo(_) => false,
            _ => true,
        }
    }

    /// Stable variant name; carries no input data.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::ReadHeader(_) => "read_header",
            Self::MissingFields(_) => "missing_fields",
            Self::ReadRow { .. } => "read_row",
            Self::MalformedRow { .. } => "malformed_row",
            Self::InvalidYear { .. } => "invalid_year",
            Self::InvalidValue { .. } => "invalid_value",
            Self::NoRecords => "no_records",
            Self::TickerRequired => "ticker_required",
            Self::Import(_) => "import_failed",
            Self::Repo(_) => "repo_failed",
        }
    }

    /// One-based CSV data row the error refers to.
    pub fn row(&self) -> Option<usize> {
        match self {
            Self::ReadRow { row, .. }
            | Self::MalformedRow { row, .. }
            | Self::InvalidYear { row, .. }
            | Self::InvalidValue { row, .. } => Some(*row),
            _ => None,
        }
    }
}

impl Display for DaxServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "failed to read CSV header: input is empty"),
            Self::ReadHeader(err) => write!(f, "failed to read CSV header: {err}"),
            Self::MissingFields(fields) => {
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Self::ReadRow { row, source } if source.is_io_error() => {
                write!(f, "failed to read CSV at row {row}: {source}")
            }
            Self::ReadRow { row, source } => write!(f, "invalid data at row {row}: {source}"),
            Self::MalformedRow { row, message } => {
                write!(f, "invalid data at row {row}: {message}")
            }
            Self::InvalidYear { row, value } => {
                write!(f, "invalid data at row {row}: invalid year `{value}`")
            }
            Self::InvalidValue { row, value } => {
                write!(f, "invalid data at row {row}: invalid value `{value}`")
            }
            Self::NoRecords => write!(f, "no records found in CSV"),
            Self::TickerRequired => write!(f, "ticker is required"),
            Self::Import(err) => write!(f, "failed to import records: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DaxServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReadHeader(err) | Self::ReadRow { source: err, .. } => Some(err),
            Self::Import(err) | Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DaxServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type ServiceResult<T> = Result<T, DaxServiceError>;

/// DAX service facade over a repository implementation.
pub struct DaxService<R: DaxRepository> {
    repo: R,
}

impl<R: DaxRepository> DaxService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Imports a CSV stream as one bulk upsert.
    ///
    /// # Contract
    /// - The header is validated before any data row is read.
    /// - Every text field is trimmed; `year` must be an integer and `value`
    ///   a finite decimal.
    /// - Nothing is written unless every row parses.
    pub fn import_csv(&self, reader: impl Read) -> ServiceResult<ImportResponse> {
        let started_at = Instant::now();
        let result = self.import_records(reader);

        match &result {
            Ok(response) => info!(
                "event=dax_import module=service status=ok records={} duration_ms={}",
                response.records_imported,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=dax_import module=service status=error {} duration_ms={}",
                error_log_fields(err),
                started_at.elapsed().as_millis()
            ),
        }

        result
    }

    /// Lists all records with normalized pagination.
    pub fn get_all(&self, page: i64, limit: i64) -> ServiceResult<PaginatedResponse> {
        let request = normalize_page_request(page, limit);
        let result = self.repo.find_all(request)?;
        debug!(
            "event=dax_query module=service status=ok filter=none page={} limit={} total={}",
            request.page, request.limit, result.total_count
        );
        Ok(paginate(request, result))
    }

    /// Lists records matching `ticker` (empty = any) and `year` (None = any).
    pub fn get_by_filters(
        &self,
        ticker: &str,
        year: Option<i32>,
        page: i64,
        limit: i64,
    ) -> ServiceResult<PaginatedResponse> {
        let request = normalize_page_request(page, limit);
        let filter = DaxFilter::new(ticker, year);
        let result = self.repo.find_by_filters(&filter, request)?;
        debug!(
            "event=dax_query module=service status=ok ticker={:?} year={:?} page={} limit={} total={}",
            filter.ticker(),
            filter.year,
            request.page,
            request.limit,
            result.total_count
        );
        Ok(paginate(request, result))
    }

    /// Lists distinct metric names for one ticker.
    ///
    /// An unknown ticker yields an empty list, not an error.
    pub fn get_metrics(&self, ticker: &str) -> ServiceResult<MetricsResponse> {
        if ticker.is_empty() {
            return Err(DaxServiceError::TickerRequired);
        }

        let metrics = self.repo.get_metrics(ticker)?;
        debug!(
            "event=dax_metrics module=service status=ok ticker={} metrics={}",
            ticker,
            metrics.len()
        );
        Ok(MetricsResponse {
            ticker: ticker.to_string(),
            metrics,
        })
    }

    /// Total number of stored records.
    pub fn count(&self) -> ServiceResult<u64> {
        Ok(self.repo.count()?)
    }

    fn import_records(&self, reader: impl Read) -> ServiceResult<ImportResponse> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header = csv_reader
            .headers()
            .map_err(DaxServiceError::ReadHeader)?
            .clone();
        if header.is_empty() {
            return Err(DaxServiceError::MissingHeader);
        }
        let columns = ColumnMap::resolve(&header)?;

        let mut records = Vec::new();
        for (index, result) in csv_reader.records().enumerate() {
            let row = index + 1;
            let fields = result.map_err(|source| DaxServiceError::ReadRow { row, source })?;
            records.push(columns.parse_row(&fields, row)?);
        }

        if records.is_empty() {
            return Err(DaxServiceError::NoRecords);
        }

        self.repo
            .bulk_upsert(&records)
            .map_err(DaxServiceError::Import)?;

        Ok(ImportResponse {
            records_imported: records.len(),
            message: format!("Successfully imported {} records", records.len()),
        })
    }
}

/// Clamps caller pagination input into a repository page request.
pub fn normalize_page_request(page: i64, limit: i64) -> PageRequest {
    let page = u32::try_from(page.max(1)).unwrap_or(u32::MAX);
    let limit = match u32::try_from(limit) {
        Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => limit,
        _ => DEFAULT_PAGE_LIMIT,
    };
    PageRequest::new(page, limit)
}

/// Log fields for a failed import; CSV cells never appear here.
fn error_log_fields(err: &DaxServiceError) -> String {
    let row = err
        .row()
        .map_or_else(|| "none".to_string(), |row| row.to_string());
    format!(
        "error_kind={} validation={} row={}",
        err.kind(),
        err.is_validation(),
        row
    )
}

fn paginate(request: PageRequest, result: RecordPage) -> PaginatedResponse {
    PaginatedResponse {
        data: result.records,
        pagination: PaginationMeta::new(request, result.total_count),
    }
}

/// Header positions of the required columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    company: usize,
    ticker: usize,
    report_type: usize,
    metric: usize,
    year: usize,
    value: usize,
    currency: usize,
    width: usize,
}

impl ColumnMap {
    /// Matches header names case-insensitively; the first duplicate wins.
    fn resolve(header: &StringRecord) -> ServiceResult<Self> {
        let mut slots: [Option<usize>; 7] = [None; 7];
        for (index, name) in header.iter().enumerate() {
            let name = name.trim().to_ascii_lowercase();
            if let Some(slot) = REQUIRED_COLUMNS.iter().position(|column| *column == name) {
                slots[slot].get_or_insert(index);
            }
        }

        match slots {
            [Some(company), Some(ticker), Some(report_type), Some(metric), Some(year), Some(value), Some(currency)] => {
                Ok(Self {
                    company,
                    ticker,
                    report_type,
                    metric,
                    year,
                    value,
                    currency,
                    width: header.len(),
                })
            }
            _ => Err(DaxServiceError::MissingFields(
                REQUIRED_COLUMNS
                    .iter()
                    .zip(slots.iter())
                    .filter(|(_, slot)| slot.is_none())
                    .map(|(column, _)| (*column).to_string())
                    .collect(),
            )),
        }
    }

    fn parse_row(&self, fields: &StringRecord, row: usize) -> ServiceResult<DaxRecord> {
        if fields.len() < self.width {
            return Err(DaxServiceError::MalformedRow {
                row,
                message: format!(
                    "expected {} columns, found {}",
                    self.width,
                    fields.len()
                ),
            });
        }

        let field = |index: usize| fields.get(index).unwrap_or_default().trim();

        let year_text = field(self.year);
        let year = year_text
            .parse::<i32>()
            .map_err(|_| DaxServiceError::InvalidYear {
                row,
                value: year_text.to_string(),
            })?;

        let value_text = field(self.value);
        let value = value_text
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| DaxServiceError::InvalidValue {
                row,
                value: value_text.to_string(),
            })?;

        Ok(DaxRecord::new(
            field(self.company),
            field(self.ticker),
            field(self.report_type),
            field(self.metric),
            year,
            Some(value),
            field(self.currency),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(columns: &[&str]) -> StringRecord {
        StringRecord::from(columns.to_vec())
    }

    #[test]
    fn normalize_page_request_clamps_inputs() {
        assert_eq!(normalize_page_request(0, 10), PageRequest::new(1, 10));
        assert_eq!(normalize_page_request(-4, 25), PageRequest::new(1, 25));
        assert_eq!(normalize_page_request(2, 0), PageRequest::new(2, 10));
        assert_eq!(normalize_page_request(2, -1), PageRequest::new(2, 10));
        assert_eq!(normalize_page_request(2, 101), PageRequest::new(2, 10));
        assert_eq!(normalize_page_request(2, 100), PageRequest::new(2, 100));
        assert_eq!(normalize_page_request(2, 1), PageRequest::new(2, 1));
    }

    #[test]
    fn resolve_accepts_any_order_and_case() {
        let columns = ColumnMap::resolve(&header(&[
            "Currency",
            "VALUE",
            "year",
            "Metric",
            "report_type",
            "Ticker",
            "company",
        ]))
        .unwrap();
        assert_eq!(columns.currency, 0);
        assert_eq!(columns.company, 6);
        assert_eq!(columns.width, 7);
    }

    #[test]
    fn resolve_lists_missing_fields_in_canonical_order() {
        let err = ColumnMap::resolve(&header(&["ticker", "company", "metric", "year"]))
            .unwrap_err();
        match err {
            DaxServiceError::MissingFields(fields) => {
                assert_eq!(fields, vec!["report_type", "value", "currency"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_row_rejects_non_finite_values() {
        let columns = ColumnMap::resolve(&header(&REQUIRED_COLUMNS)).unwrap();
        let row = StringRecord::from(vec!["SAP SE", "SAP", "income", "EBITDA", "2025", "NaN", "EUR"]);

        let err = columns.parse_row(&row, 3).unwrap_err();
        assert!(matches!(err, DaxServiceError::InvalidValue { row: 3, .. }));
    }

    #[test]
    fn import_error_log_fields_omit_cell_contents() {
        let err = DaxServiceError::InvalidValue {
            row: 1,
            value: "SECRET-123".to_string(),
        };

        let fields = error_log_fields(&err);
        assert_eq!(fields, "error_kind=invalid_value validation=true row=1");
        assert!(!fields.contains("SECRET-123"));

        let fields = error_log_fields(&DaxServiceError::NoRecords);
        assert_eq!(fields, "error_kind=no_records validation=true row=none");
    }

    #[test]
    fn validation_classification() {
        assert!(DaxServiceError::TickerRequired.is_validation());
        assert!(DaxServiceError::NoRecords.is_validation());
        assert!(!DaxServiceError::Import(RepoError::Conflict("x".to_string())).is_validation());
    }
}
