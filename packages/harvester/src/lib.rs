//! COUNTER Harvester - Download COUNTER 5 and 5.1 usage reports over SUSHI.
//!
//! This crate talks to SUSHI servers, negotiates the date format each server
//! accepts and hands the response to [`counter_ingest`] for parsing.
//!
//! # Example
//!
//! ```
//! use counter_harvester::{ClientConfig, ReportRequest, SushiClient};
//! use counter_ingest::CounterVersion;
//!
//! let config = ClientConfig::new("https://sushi.example.com/counter/r5", "cust-123")
//!     .with_requestor_id("req-456");
//! let client = SushiClient::new(config, CounterVersion::V5).unwrap();
//!
//! let report = ReportRequest::parse("tr_j1").unwrap();
//! let url = client.report_url(&report).unwrap();
//! assert_eq!(url.as_str(), "https://sushi.example.com/counter/r5/reports/tr_j1");
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Configuration constants, client settings and validation
//! - [`catalogue`]: Report types and standard views
//! - [`client`]: SUSHI requests and date-format negotiation
//! - [`http`]: HTTP client construction and body spooling
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod catalogue;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use catalogue::ReportRequest;
pub use client::{Records, SushiClient, SushiResponse};
pub use config::{
    parse_month, parse_proxies, ClientConfig, Credentials, DateEncoding, DateOrder, ProxySetting,
};
pub use error::{HarvesterError, Result};
