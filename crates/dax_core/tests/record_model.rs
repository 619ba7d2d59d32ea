use chrono::{TimeZone, Utc};
use dax_core::{
    DaxRecord, ImportResponse, MetricsResponse, PageRequest, PaginatedResponse, PaginationMeta,
    DEFAULT_CURRENCY,
};
use uuid::Uuid;

fn sample() -> DaxRecord {
    DaxRecord::new(
        "Siemens AG",
        "SIE",
        "income",
        "EBITDA",
        2025,
        Some(15_859_000_000.0),
        "EUR",
    )
}

#[test]
fn record_new_has_no_identity_yet() {
    let record = sample();

    assert_eq!(record.id, None);
    assert_eq!(record.created_at, None);
    assert_eq!(record.updated_at, None);
}

#[test]
fn stamped_fills_identity_and_default_currency() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut record = sample();
    record.currency = "  ".to_string();

    let stamped = record.stamped(now);
    assert!(stamped.id.is_some());
    assert_eq!(stamped.currency, DEFAULT_CURRENCY);
    assert_eq!(stamped.created_at, Some(now));
    assert_eq!(stamped.updated_at, Some(now));

    let restamped = stamped.stamped(now);
    assert_eq!(restamped.id, stamped.id);
}

#[test]
fn record_serialization_uses_expected_wire_fields() {
    let id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let mut record = sample().stamped(now);
    record.id = Some(id);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["id"], id.to_string());
    assert_eq!(json["company"], "Siemens AG");
    assert_eq!(json["ticker"], "SIE");
    assert_eq!(json["report_type"], "income");
    assert_eq!(json["metric"], "EBITDA");
    assert_eq!(json["year"], 2025);
    assert_eq!(json["value"], 15_859_000_000.0);
    assert_eq!(json["currency"], "EUR");
    assert_eq!(json["created_at"], "2026-03-01T12:00:00Z");

    let decoded: DaxRecord = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn missing_value_is_distinct_from_zero() {
    let mut missing = sample();
    missing.value = None;
    let mut zero = sample();
    zero.value = Some(0.0);

    assert!(serde_json::to_value(&missing).unwrap()["value"].is_null());
    assert_eq!(serde_json::to_value(&zero).unwrap()["value"], 0.0);
    assert_ne!(missing, zero);
}

#[test]
fn paginated_response_uses_expected_wire_fields() {
    let response = PaginatedResponse {
        data: vec![sample()],
        pagination: PaginationMeta::new(PageRequest::new(2, 10), 25),
    };

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["page"], 2);
    assert_eq!(json["pagination"]["limit"], 10);
    assert_eq!(json["pagination"]["total_count"], 25);
    assert_eq!(json["pagination"]["total_pages"], 3);
}

#[test]
fn empty_result_has_zero_pages() {
    let meta = PaginationMeta::new(PageRequest::new(1, 10), 0);
    assert_eq!(meta.total_pages, 0);
}

#[test]
fn import_and_metrics_responses_use_expected_wire_fields() {
    let import = ImportResponse {
        records_imported: 2,
        message: "Successfully imported 2 records".to_string(),
    };
    let json = serde_json::to_value(&import).unwrap();
    assert_eq!(json["records_imported"], 2);
    assert_eq!(json["message"], "Successfully imported 2 records");

    let metrics = MetricsResponse {
        ticker: "SAP".to_string(),
        metrics: vec!["EBITDA".to_string(), "Revenue".to_string()],
    };
    let json = serde_json::to_value(&metrics).unwrap();
    assert_eq!(json["ticker"], "SAP");
    assert_eq!(json["metrics"], serde_json::json!(["EBITDA", "Revenue"]));
}
