//! Release 5 JSON ingestion against fixture responses.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use counter_ingest::{
    read_report, CounterVersion, ErrorCode, IdentifierKind, IngestError, ProtocolError,
    ReadResult, ReportType, Result, Severity, UsageRecord,
};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("counter5")
        .join(name)
}

fn read_fixture(name: &str) -> Result<ReadResult<File>> {
    let path = fixture_path(name);
    let file =
        File::open(&path).unwrap_or_else(|e| panic!("Failed to open {}: {}", path.display(), e));
    read_report(file, CounterVersion::V5, Some(200))
}

fn records(name: &str, report_type: ReportType) -> Vec<UsageRecord> {
    read_fixture(name)
        .unwrap()
        .into_records(report_type)
        .collect::<Result<_>>()
        .unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[test]
fn test_single_title_single_month() {
    let result = read_fixture("tr_one_month.json").unwrap();
    assert!(result.record_found);
    assert!(result.diagnostics.is_empty());
    assert_eq!(result.header["Report_ID"], "TR");
    assert_eq!(result.months(), vec![date(2019, 1, 1)]);

    let records: Vec<_> = result
        .into_records(ReportType::Tr)
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.value, 10);
    assert_eq!(record.start, date(2019, 1, 1));
    assert_eq!(record.end, Some(date(2019, 1, 31)));
    assert_eq!(record.metric.as_deref(), Some("Total_Item_Investigations"));
    assert_eq!(record.title.as_deref(), Some("Journal of Sample Studies"));
    assert_eq!(record.title_ids.get(IdentifierKind::OnlineIssn), Some("8765-4321"));
    assert_eq!(record.title_ids.get(IdentifierKind::Proprietary), Some("SP:JSS"));
    assert_eq!(record.dimension_data.len(), 7);
    assert_eq!(
        record.dimension_data.get("Section_Type").map(String::as_str),
        Some("Article")
    );
}

#[test]
fn test_body_wrapped_document_yields_identical_records() {
    let plain = records("tr_one_month.json", ReportType::Tr);
    let wrapped = records("tr_body_wrapped.json", ReportType::Tr);
    assert_eq!(plain, wrapped);

    let result = read_fixture("tr_body_wrapped.json").unwrap();
    assert_eq!(result.header["Customer_ID"], "cust-123");
}

#[test]
fn test_naked_error() {
    let result = read_fixture("naked_error.json").unwrap();
    assert!(!result.record_found);
    assert_eq!(result.errors().len(), 1);
    assert!(result.warnings().is_empty());
    assert!(result.errors()[0].is(ErrorCode::NotAuthorizedInstitution));
    assert_eq!(result.errors()[0].data(), "Check the customer_id");

    let err = result.validate().unwrap_err();
    assert!(matches!(err, IngestError::Sushi { .. }));
    assert_eq!(result.into_records(ReportType::Tr).count(), 0);
}

#[test]
fn test_error_list() {
    let result = read_fixture("error_list.json").unwrap();
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(result.infos().len(), 1);
    assert_eq!(result.infos()[0].severity, Severity::Info);
    assert!(result.header.is_empty());
    assert_eq!(result.into_records(ReportType::Tr).count(), 0);
}

#[test]
fn test_queued_report() {
    let result = read_fixture("queued.json").unwrap();
    assert!(result.queued());
    assert_eq!(result.warnings().len(), 1);
    assert!(result.errors().is_empty());
    assert!(result.validate().is_ok());
}

#[test]
fn test_stringified_document() {
    let result = read_fixture("stringified.json").unwrap();
    assert_eq!(result.errors().len(), 1);
    assert!(result.errors()[0].is(ErrorCode::NoDataForDateArgs));
    assert_eq!(result.header["Report_ID"], "TR");
    assert!(!result.record_found);
}

#[test]
fn test_no_data_header() {
    let result = read_fixture("no_data.json").unwrap();
    assert!(!result.record_found);
    assert_eq!(result.errors().len(), 1);
    assert!(matches!(result.errors()[0], ProtocolError::Semantic(_)));
    assert_eq!(
        result.months(),
        vec![date(2019, 1, 1), date(2019, 2, 1), date(2019, 3, 1)]
    );
}

#[test]
fn test_disallowed_identifier_stops_extraction() {
    let result = read_fixture("extra_ids.json").unwrap();
    let outcome: Vec<_> = result.into_records(ReportType::Tr).collect();
    assert_eq!(outcome.len(), 2);
    assert_eq!(outcome[0].as_ref().unwrap().value, 5);

    let err = outcome[1].as_ref().unwrap_err();
    assert_eq!(err.to_string(), "Extra IDs not allowed {linking_issn}");
    assert!(err.content().unwrap().contains("Second Journal"));
}

#[test]
fn test_item_report() {
    let records = records("ir_sample.json", ReportType::Ir);
    assert_eq!(records.len(), 3);

    let first = &records[0];
    assert_eq!(first.title.as_deref(), Some("The Sample Book"));
    assert_eq!(first.title_ids.get(IdentifierKind::Isbn), Some("978-3-16-148410-0"));
    assert_eq!(first.item.as_deref(), Some("Chapter 1: Beginnings"));
    assert_eq!(first.item_ids.get(IdentifierKind::Doi), Some("10.9999/book.ch1"));
    assert_eq!(first.item_publication_date.as_deref(), Some("2017-03-01"));

    let authors = first.item_authors.as_ref().unwrap();
    assert_eq!(authors.len(), 2);
    assert_eq!(authors[0].orcid.as_deref(), Some("0000-0002-1825-0097"));
    assert_eq!(authors[1].isni.as_deref(), Some("0000000121032683"));
    assert_eq!(
        first.dimension_data.get("Parent_Data_Type").map(String::as_str),
        Some("Book")
    );

    assert_eq!(records[2].start, date(2019, 2, 1));
    assert_eq!(records[2].end, Some(date(2019, 2, 28)));
}

#[test]
fn test_records_as_csv() {
    let records = records("tr_one_month.json", ReportType::Tr);
    let mut out = Vec::new();
    counter_ingest::write_records_csv(&mut out, records.into_iter().map(Ok)).unwrap();
    let text = String::from_utf8(out).unwrap();
    let row = text.lines().nth(1).unwrap();
    assert!(row.starts_with("2019-01-01,2019-01-31,,Journal of Sample Studies,"));
    assert!(row.contains("Online_ISSN:8765-4321|Print_ISSN:1234-5678|Proprietary:SP:JSS"));
    assert!(row.ends_with(",Total_Item_Investigations,10"));
}
