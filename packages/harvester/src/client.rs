//! SUSHI client: request construction and date-format negotiation.
//!
//! Servers disagree on how `begin_date` and `end_date` should look. Some
//! only accept `YYYY-MM`, others insist on `YYYY-MM-DD`, and both kinds
//! answer the wrong one with exception 3020. The client tries the preferred
//! encoding first and falls back to the other one on that exception only.

use std::fmt;
use std::fs::File;

use chrono::NaiveDate;
use counter_ingest::dates::{begin_month, end_month};
use counter_ingest::{
    read_report, CounterVersion, ErrorCode, ReadResult, RecordStream, ReportType, UsageRecord,
};
use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

use crate::catalogue::ReportRequest;
use crate::config::{ClientConfig, DateEncoding};
use crate::error::{HarvesterError, Result};
use crate::http::{create_client, download_to_tempfile};

const CUSTOMER_ID_PARAM: &str = "customer_id";
const REQUESTOR_ID_PARAM: &str = "requestor_id";
const API_KEY_PARAM: &str = "api_key";

/// Client for one SUSHI endpoint and COUNTER release.
pub struct SushiClient {
    http: Client,
    config: ClientConfig,
    version: CounterVersion,
}

impl SushiClient {
    pub fn new(config: ClientConfig, version: CounterVersion) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(HarvesterError::Config("SUSHI URL is empty".to_string()));
        }
        let proxy = config.proxy();
        if let Some(proxy) = proxy {
            debug!(proxy = %proxy.proxy_url(), url = %config.url, "Using proxy");
        }
        Ok(Self {
            http: create_client(config.timeout, proxy)?,
            config,
            version,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn version(&self) -> CounterVersion {
        self.version
    }

    /// Endpoint of `report`, without query parameters.
    ///
    /// Release 5.1 lives under `/r51`; a base URL that already ends in
    /// `/r51` is used as is.
    pub fn report_url(&self, report: &ReportRequest) -> Result<Url> {
        let base = self.config.url.trim().trim_end_matches('/');
        let url = match self.version {
            CounterVersion::V51 if !base.ends_with("/r51") => {
                format!("{base}/r51/reports/{}", report.code())
            }
            _ => format!("{base}/reports/{}", report.code()),
        };
        Ok(Url::parse(&url)?)
    }

    /// Query parameters of one request, in the order they are sent.
    ///
    /// Identity first, then configured extras, report extras and the
    /// caller's `overrides`; a later source replaces the value of an earlier
    /// one in place. The dates come last.
    #[must_use]
    pub fn request_params(
        &self,
        report: &ReportRequest,
        begin: NaiveDate,
        end: NaiveDate,
        encoding: DateEncoding,
        overrides: &[(String, String)],
    ) -> Vec<(String, String)> {
        let mut params = vec![(
            CUSTOMER_ID_PARAM.to_string(),
            self.config.customer_identity().to_string(),
        )];
        if let Some(requestor_id) = &self.config.requestor_id {
            set_param(&mut params, REQUESTOR_ID_PARAM, requestor_id);
        }
        for (name, value) in &self.config.extra_params {
            set_param(&mut params, name, value);
        }
        for (name, value) in report.extra_params(self.version) {
            set_param(&mut params, name, value);
        }
        for (name, value) in overrides {
            set_param(&mut params, name, value);
        }
        set_param(&mut params, "begin_date", &encoding.encode(begin_month(begin)));
        set_param(&mut params, "end_date", &encoding.encode(end_month(end)));
        params
    }

    /// Full request URL for one attempt.
    pub fn request_url(
        &self,
        report: &ReportRequest,
        begin: NaiveDate,
        end: NaiveDate,
        encoding: DateEncoding,
        overrides: &[(String, String)],
    ) -> Result<Url> {
        let mut url = self.report_url(report)?;
        url.query_pairs_mut()
            .extend_pairs(self.request_params(report, begin, end, encoding, overrides));
        Ok(url)
    }

    /// Perform a single request with one date encoding.
    ///
    /// Bodies of 2xx and 4xx/5xx responses are read as reports, since
    /// servers often explain a failure with a SUSHI exception. Any other
    /// status is fatal.
    pub fn fetch(
        &self,
        report: &ReportRequest,
        begin: NaiveDate,
        end: NaiveDate,
        encoding: DateEncoding,
        overrides: &[(String, String)],
    ) -> Result<SushiResponse> {
        let url = self.request_url(report, begin, end, encoding, overrides)?;
        debug!(url = %redacted(&url), "Requesting report");

        let spooled = download_to_tempfile(&self.http, url)?;
        if !is_report_status(spooled.status) {
            return Err(HarvesterError::UnexpectedStatus {
                status: spooled.status,
                url: redacted(&spooled.url).to_string(),
            });
        }

        let result = read_report(spooled.body.reopen()?, self.version, Some(spooled.status))?;
        Ok(SushiResponse {
            url: spooled.url,
            http_status: spooled.status,
            report: result,
            layout: report.layout(),
            body: spooled.body,
        })
    }

    /// Download `report` for the months from `begin` to `end`.
    ///
    /// Dates are widened to whole months. When the server rejects the
    /// first date encoding with exception 3020 the request is repeated with
    /// the other one; whatever the last attempt returned is handed back for
    /// the caller to inspect.
    pub fn get_report_data(
        &self,
        report: &ReportRequest,
        begin: NaiveDate,
        end: NaiveDate,
        overrides: &[(String, String)],
    ) -> Result<SushiResponse> {
        let [preferred, fallback] = self.config.date_order.encodings();

        let response = self.fetch(report, begin, end, preferred, overrides)?;
        if !response.rejects_dates() {
            return Ok(response);
        }

        info!(
            report = %report,
            encoding = ?fallback,
            "Date arguments rejected, retrying with the other date format"
        );
        self.fetch(report, begin, end, fallback, overrides)
    }
}

/// A downloaded and parsed report.
///
/// Owns the temporary file holding the raw body.
pub struct SushiResponse {
    /// Final URL of the request (may contain credentials).
    pub url: Url,
    pub http_status: u16,
    pub report: ReadResult<File>,
    layout: ReportType,
    body: NamedTempFile,
}

impl SushiResponse {
    #[must_use]
    pub fn layout(&self) -> ReportType {
        self.layout
    }

    /// Fresh handle on the raw response body, positioned at the start.
    pub fn body(&self) -> Result<File> {
        Ok(self.body.reopen()?)
    }

    /// Whether the server rejected the date arguments (exception 3020).
    #[must_use]
    pub fn rejects_dates(&self) -> bool {
        self.report
            .errors()
            .iter()
            .any(|error| error.is(ErrorCode::InvalidDateArgs))
    }

    /// Raise server-reported errors; warnings are only logged.
    pub fn validate(&self) -> Result<()> {
        Ok(self.report.validate()?)
    }

    /// Normalized records, projected with the requested report's layout.
    pub fn into_records(self) -> Records {
        Records {
            stream: self.report.into_records(self.layout),
            _body: self.body,
        }
    }
}

impl fmt::Debug for SushiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SushiResponse")
            .field("url", &redacted(&self.url).as_str())
            .field("http_status", &self.http_status)
            .field("layout", &self.layout)
            .field("diagnostics", &self.report.diagnostics)
            .finish_non_exhaustive()
    }
}

/// Records of a [`SushiResponse`], keeping its body file alive.
pub struct Records {
    stream: RecordStream<File>,
    _body: NamedTempFile,
}

impl Iterator for Records {
    type Item = counter_ingest::Result<UsageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next()
    }
}

fn is_report_status(status: u16) -> bool {
    (200..300).contains(&status) || (400..600).contains(&status)
}

fn set_param(params: &mut Vec<(String, String)>, name: &str, value: &str) {
    match params.iter_mut().find(|(key, _)| key == name) {
        Some((_, existing)) => *existing = value.to_string(),
        None => params.push((name.to_string(), value.to_string())),
    }
}

/// `url` with the `api_key` value masked, for logs and error messages.
#[must_use]
pub fn redacted(url: &Url) -> Url {
    let mut masked = url.clone();
    if url.query().is_none() {
        return masked;
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case(API_KEY_PARAM) {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked
}
