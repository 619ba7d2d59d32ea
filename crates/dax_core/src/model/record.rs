//! DAX record domain model.
//!
//! # Responsibility
//! - Define the canonical shape of one reported metric value.
//! - Define the business key and the listing order shared by all stores.
//!
//! # Invariants
//! - `(company, ticker, metric, year)` identifies at most one stored record.
//! - `value = None` means "not reported" and is distinct from `Some(0.0)`.
//! - Persisted records always carry `id`, `created_at` and `updated_at`.
//!
//! # See also
//! - docs/architecture/dax-data-layer.md

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Stable identifier assigned to a record on first persistence.
pub type DaxRecordId = Uuid;

/// Currency applied when a write carries a blank currency code.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// One reported metric value for one company/ticker in one fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaxRecord {
    /// `None` until a repository assigns or accepts an id.
    pub id: Option<DaxRecordId>,
    pub company: String,
    pub ticker: String,
    /// Free text, e.g. `income`.
    pub report_type: String,
    /// Free text, e.g. `EBITDA`.
    pub metric: String,
    pub year: i32,
    pub value: Option<f64>,
    /// Three-letter currency code.
    pub currency: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DaxRecord {
    /// Creates an unpersisted record without id or timestamps.
    pub fn new(
        company: impl Into<String>,
        ticker: impl Into<String>,
        report_type: impl Into<String>,
        metric: impl Into<String>,
        year: i32,
        value: Option<f64>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            company: company.into(),
            ticker: ticker.into(),
            report_type: report_type.into(),
            metric: metric.into(),
            year,
            value,
            currency: currency.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns the business key of this record.
    pub fn key(&self) -> DaxKey {
        DaxKey {
            company: self.company.clone(),
            ticker: self.ticker.clone(),
            metric: self.metric.clone(),
            year: self.year,
        }
    }

    /// Prepares a record for a write: assigns a missing id, fills a blank
    /// currency, stores a non-finite value as missing and stamps both
    /// timestamps with `now`.
    ///
    /// Upsert collisions later restore the stored id and `created_at`.
    pub fn stamped(&self, now: DateTime<Utc>) -> DaxRecord {
        let mut record = self.clone();
        record.id = Some(record.id.unwrap_or_else(Uuid::new_v4));
        record.value = record.value.filter(|value| value.is_finite());
        if record.currency.trim().is_empty() {
            record.currency = DEFAULT_CURRENCY.to_string();
        }
        record.created_at = Some(now);
        record.updated_at = Some(now);
        record
    }
}

/// Business key: `(company, ticker, metric, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DaxKey {
    pub company: String,
    pub ticker: String,
    pub metric: String,
    pub year: i32,
}

/// Listing order used by every read path.
///
/// `year DESC, ticker ASC, metric ASC`, then `company ASC, id ASC` so that
/// pages never overlap when two companies share ticker and metric.
pub fn listing_order(left: &DaxRecord, right: &DaxRecord) -> Ordering {
    right
        .year
        .cmp(&left.year)
        .then_with(|| left.ticker.cmp(&right.ticker))
        .then_with(|| left.metric.cmp(&right.metric))
        .then_with(|| left.company.cmp(&right.company))
        .then_with(|| left.id.cmp(&right.id))
}

/// SQL counterpart of [`listing_order`].
pub const LISTING_ORDER_SQL: &str = "year DESC, ticker ASC, metric ASC, company ASC, id ASC";

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str, ticker: &str, metric: &str, year: i32) -> DaxRecord {
        DaxRecord::new(company, ticker, "income", metric, year, Some(1.0), "EUR")
    }

    #[test]
    fn listing_order_puts_newest_year_first() {
        let mut rows = vec![
            record("SAP SE", "SAP", "Revenue", 2023),
            record("Siemens AG", "SIE", "EBITDA", 2025),
            record("SAP SE", "SAP", "EBITDA", 2025),
        ];
        rows.sort_by(listing_order);

        let order: Vec<(i32, &str, &str)> = rows
            .iter()
            .map(|row| (row.year, row.ticker.as_str(), row.metric.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (2025, "SAP", "EBITDA"),
                (2025, "SIE", "EBITDA"),
                (2023, "SAP", "Revenue"),
            ]
        );
    }

    #[test]
    fn stamped_fills_id_currency_and_timestamps() {
        let now = Utc::now();
        let mut input = record("SAP SE", "SAP", "EBITDA", 2025);
        input.currency = "  ".to_string();

        let stamped = input.stamped(now);
        assert!(stamped.id.is_some());
        assert_eq!(stamped.currency, DEFAULT_CURRENCY);
        assert_eq!(stamped.created_at, Some(now));
        assert_eq!(stamped.updated_at, Some(now));
    }

    #[test]
    fn stamped_keeps_caller_id() {
        let id = Uuid::new_v4();
        let mut input = record("SAP SE", "SAP", "EBITDA", 2025);
        input.id = Some(id);

        assert_eq!(input.stamped(Utc::now()).id, Some(id));
    }

    #[test]
    fn stamped_drops_non_finite_value() {
        let mut input = record("SAP SE", "SAP", "EBITDA", 2025);
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            input.value = Some(bad);
            assert_eq!(input.stamped(Utc::now()).value, None);
        }

        input.value = Some(-0.5);
        assert_eq!(input.stamped(Utc::now()).value, Some(-0.5));
    }
}
