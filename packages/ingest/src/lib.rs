//! COUNTER Ingest - read COUNTER 5 and 5.1 usage reports.
//!
//! This crate turns SUSHI JSON responses and tabular COUNTER exports into
//! a uniform stream of [`UsageRecord`]s, tolerating the many ways real
//! servers deviate from the Code of Practice.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use counter_ingest::{read_report, CounterVersion, ReportType};
//!
//! let body = r#"{
//!     "Report_Header": {"Report_ID": "PR", "Customer_ID": "cust"},
//!     "Report_Items": [{
//!         "Platform": "Sample",
//!         "Performance": [{
//!             "Period": {"Begin_Date": "2019-01-01", "End_Date": "2019-01-31"},
//!             "Instance": [{"Metric_Type": "Searches_Platform", "Count": 12}]
//!         }]
//!     }]
//! }"#;
//!
//! let result = read_report(Cursor::new(body), CounterVersion::V5, Some(200)).unwrap();
//! assert!(result.validate().is_ok());
//! let records: Vec<_> = result
//!     .into_records(ReportType::Pr)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(records[0].value, 12);
//! ```
//!
//! # Architecture
//!
//! - [`severity`]: exception codes and their severity
//! - [`finder`]: key search over arbitrary JSON trees
//! - [`exception`]: server-reported errors and their extraction
//! - [`ingest`]: document shape detection and lazy item streaming
//! - [`project`]: item to record projection per release and report type
//! - [`tabular`]: CSV/TSV exports
//! - [`report`]: report catalogue (versions, types, layouts)
//! - [`record`]: the normalized record model and its CSV form
//! - [`dates`]: month parsing and reporting periods
//! - [`error`]: error types and Result alias

pub mod dates;
pub mod error;
pub mod exception;
pub mod finder;
pub mod ingest;
pub mod project;
pub mod record;
pub mod report;
pub mod severity;
pub mod tabular;

pub use error::{IngestError, Result};
pub use exception::{extract_errors, ProtocolError, SemanticError, TransportError};
pub use ingest::{read_report, Diagnostics, ReadResult, ReportItems};
pub use project::RecordStream;
pub use record::{write_records_csv, Author, IdentifierKind, Identifiers, UsageRecord};
pub use report::{CounterVersion, ReportType, ReportVariant};
pub use severity::{classify, ErrorCode, Severity};
pub use tabular::{TabularReader, TabularReport};
