//! SUSHI exception codes and their severity classification.
//!
//! Several codes are deliberately classified against the nominal COUNTER
//! Code of Practice: servers returning 3050, 3061 or 3062 still deliver the
//! full data set, so those codes are informational here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a server-reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exception codes with a known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum ErrorCode {
    ServiceNotAvailable = 1000,
    ServiceBusy = 1010,
    PreparingData = 1011,
    TooManyRequests = 1020,
    InsufficientData = 1030,
    NotAuthorized = 2000,
    NotAuthorizedInstitution = 2010,
    GlobalReportsNotSupported = 2011,
    InvalidApiKey = 2020,
    NotAuthorizedIpAddress = 2030,
    ReportNotSupported = 3000,
    ReportVersionNotSupported = 3010,
    InvalidDateArgs = 3020,
    NoDataForDateArgs = 3030,
    DataNotReadyForDateArgs = 3031,
    NoLongerAvailable = 3032,
    PartialDataReturned = 3040,
    ParameterNotRecognized = 3050,
    InvalidReportFilter = 3060,
    IncongruousReportFilter = 3061,
    InvalidReportAttribute = 3062,
    ComponentsNotSupported = 3063,
    MissingReportFilter = 3070,
    MissingReportAttribute = 3071,
    ReturnDataLimitReached = 3080,
}

impl ErrorCode {
    const ALL: [Self; 25] = [
        Self::ServiceNotAvailable,
        Self::ServiceBusy,
        Self::PreparingData,
        Self::TooManyRequests,
        Self::InsufficientData,
        Self::NotAuthorized,
        Self::NotAuthorizedInstitution,
        Self::GlobalReportsNotSupported,
        Self::InvalidApiKey,
        Self::NotAuthorizedIpAddress,
        Self::ReportNotSupported,
        Self::ReportVersionNotSupported,
        Self::InvalidDateArgs,
        Self::NoDataForDateArgs,
        Self::DataNotReadyForDateArgs,
        Self::NoLongerAvailable,
        Self::PartialDataReturned,
        Self::ParameterNotRecognized,
        Self::InvalidReportFilter,
        Self::IncongruousReportFilter,
        Self::InvalidReportAttribute,
        Self::ComponentsNotSupported,
        Self::MissingReportFilter,
        Self::MissingReportAttribute,
        Self::ReturnDataLimitReached,
    ];

    /// Numeric value of the code.
    #[must_use]
    pub fn value(self) -> i64 {
        self as i64
    }

    /// Look up a known code.
    #[must_use]
    pub fn from_value(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.value() == code)
    }

    /// Severity assigned to this code.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::PreparingData
            | Self::NoLongerAvailable
            | Self::PartialDataReturned
            | Self::InvalidReportFilter
            | Self::ReturnDataLimitReached => Severity::Warning,
            // full data are still returned with these
            Self::ParameterNotRecognized
            | Self::IncongruousReportFilter
            | Self::InvalidReportAttribute => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Classify a numeric exception code.
///
/// `None` stands for a missing or non-numeric code and is treated as an error.
///
/// # Examples
/// ```
/// use counter_ingest::severity::{classify, Severity};
///
/// assert_eq!(classify(Some(0)), Severity::Info);
/// assert_eq!(classify(Some(3031)), Severity::Error);
/// assert_eq!(classify(Some(3032)), Severity::Warning);
/// assert_eq!(classify(None), Severity::Error);
/// ```
#[must_use]
pub fn classify(code: Option<i64>) -> Severity {
    match code {
        None => Severity::Error,
        Some(0) => Severity::Info,
        Some(code) if (1..999).contains(&code) => Severity::Warning,
        Some(code) => ErrorCode::from_value(code)
            .map(ErrorCode::severity)
            .unwrap_or(Severity::Error),
    }
}

/// Interpret a JSON value as an exception code.
///
/// Servers send codes both as numbers and as numeric strings.
#[must_use]
pub fn code_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Classify a code exactly as it appeared in a document.
#[must_use]
pub fn classify_value(value: Option<&Value>) -> Severity {
    classify(value.and_then(code_number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_is_info() {
        assert_eq!(classify(Some(0)), Severity::Info);
    }

    #[test]
    fn test_low_codes_are_warnings() {
        assert_eq!(classify(Some(1)), Severity::Warning);
        assert_eq!(classify(Some(500)), Severity::Warning);
        assert_eq!(classify(Some(998)), Severity::Warning);
        assert_eq!(classify(Some(999)), Severity::Error);
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(classify(Some(1000)), Severity::Error);
        assert_eq!(classify(Some(1010)), Severity::Error);
        assert_eq!(classify(Some(1011)), Severity::Warning);
        assert_eq!(classify(Some(1020)), Severity::Error);
        assert_eq!(classify(Some(2010)), Severity::Error);
        assert_eq!(classify(Some(3020)), Severity::Error);
        assert_eq!(classify(Some(3030)), Severity::Error);
        assert_eq!(classify(Some(3040)), Severity::Warning);
        assert_eq!(classify(Some(3060)), Severity::Warning);
        assert_eq!(classify(Some(3070)), Severity::Error);
        assert_eq!(classify(Some(3080)), Severity::Warning);
    }

    #[test]
    fn test_deliberate_info_codes() {
        assert_eq!(classify(Some(3050)), Severity::Info);
        assert_eq!(classify(Some(3061)), Severity::Info);
        assert_eq!(classify(Some(3062)), Severity::Info);
    }

    #[test]
    fn test_unknown_high_codes_are_errors() {
        assert_eq!(classify(Some(1001)), Severity::Error);
        assert_eq!(classify(Some(2090)), Severity::Error);
        assert_eq!(classify(Some(-5)), Severity::Error);
    }

    #[test]
    fn test_classify_value() {
        assert_eq!(classify_value(Some(&json!("3032"))), Severity::Warning);
        assert_eq!(classify_value(Some(&json!(3032))), Severity::Warning);
        assert_eq!(classify_value(Some(&json!("abc"))), Severity::Error);
        assert_eq!(classify_value(Some(&json!(null))), Severity::Error);
        assert_eq!(classify_value(Some(&json!(10.5))), Severity::Error);
        assert_eq!(classify_value(None), Severity::Error);
    }

    #[test]
    fn test_error_code_round_trip_lookup() {
        assert_eq!(ErrorCode::from_value(3020), Some(ErrorCode::InvalidDateArgs));
        assert_eq!(ErrorCode::InvalidDateArgs.value(), 3020);
        assert_eq!(ErrorCode::from_value(4242), None);
    }
}
