//! Report types a SUSHI server can be asked for.
//!
//! Master reports (`tr`, `dr`, `pr`, `ir`) and their standard views
//! (`tr_j1`, `dr_d2`, ...). Views are filtered versions of their master and
//! share its layout, except `ir_m1` which has a layout of its own.

use std::fmt;
use std::str::FromStr;

use counter_ingest::{CounterVersion, ReportType, ReportVariant};

use crate::error::HarvesterError;

/// Master report codes with their standard view suffixes.
const CATALOGUE: &[(&str, ReportType, &[&str])] = &[
    ("tr", ReportType::Tr, &["b1", "b2", "b3", "j1", "j2", "j3", "j4"]),
    ("dr", ReportType::Dr, &["d1", "d2"]),
    ("ir", ReportType::Ir, &["a1", "m1"]),
    ("pr", ReportType::Pr, &["p1"]),
];

/// A validated report code, e.g. `tr` or `tr_j1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    code: String,
    layout: ReportType,
    is_view: bool,
}

impl ReportRequest {
    /// Validate a report code (case-insensitive).
    pub fn parse(code: &str) -> Result<Self, HarvesterError> {
        let code = code.trim().to_lowercase();
        let (master, view) = match code.split_once('_') {
            Some((master, view)) => (master, Some(view)),
            None => (code.as_str(), None),
        };

        let Some((_, master_type, views)) = CATALOGUE.iter().find(|(name, _, _)| *name == master)
        else {
            return Err(HarvesterError::InvalidReportType(code.clone()));
        };

        let layout = match view {
            None => *master_type,
            Some(view) if !views.contains(&view) => {
                return Err(HarvesterError::InvalidReportType(code.clone()));
            }
            Some("m1") if *master_type == ReportType::Ir => ReportType::IrM1,
            Some(_) => *master_type,
        };

        Ok(Self {
            is_view: view.is_some(),
            code,
            layout,
        })
    }

    /// Lowercase code as it appears in the request path.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Layout the response is projected with.
    #[must_use]
    pub fn layout(&self) -> ReportType {
        self.layout
    }

    #[must_use]
    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// Report-specific query parameters for `version`.
    ///
    /// Views have their attributes fixed by the standard, so only master
    /// reports and `ir_m1` ask for extra columns.
    #[must_use]
    pub fn extra_params(&self, version: CounterVersion) -> &'static [(&'static str, &'static str)] {
        if self.is_view && self.layout != ReportType::IrM1 {
            return &[];
        }
        ReportVariant::new(version, self.layout).extra_params()
    }
}

impl fmt::Display for ReportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl FromStr for ReportRequest {
    type Err = HarvesterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_master_reports() {
        for (code, layout) in [
            ("tr", ReportType::Tr),
            ("DR", ReportType::Dr),
            ("pr", ReportType::Pr),
            ("ir", ReportType::Ir),
        ] {
            let request = ReportRequest::parse(code).unwrap();
            assert_eq!(request.layout(), layout);
            assert!(!request.is_view());
            assert_eq!(request.code(), code.to_lowercase());
        }
    }

    #[test]
    fn test_views_use_master_layout() {
        let request: ReportRequest = "TR_J1".parse().unwrap();
        assert_eq!(request.code(), "tr_j1");
        assert_eq!(request.layout(), ReportType::Tr);
        assert!(request.is_view());

        assert_eq!(ReportRequest::parse("ir_a1").unwrap().layout(), ReportType::Ir);
        assert_eq!(ReportRequest::parse("ir_m1").unwrap().layout(), ReportType::IrM1);
        assert_eq!(ReportRequest::parse("pr_p1").unwrap().layout(), ReportType::Pr);
    }

    #[test]
    fn test_unknown_reports() {
        for code in ["xx", "tr_x9", "dr_j1", "pr_", "ir_m1_extra"] {
            assert!(
                matches!(
                    ReportRequest::parse(code),
                    Err(HarvesterError::InvalidReportType(_))
                ),
                "{code} should be rejected"
            );
        }
    }

    #[test]
    fn test_extra_params_for_masters_only() {
        let tr = ReportRequest::parse("tr").unwrap();
        assert_eq!(
            tr.extra_params(CounterVersion::V5),
            &[(
                "attributes_to_show",
                "YOP|Access_Method|Access_Type|Data_Type|Section_Type"
            )]
        );
        assert!(ReportRequest::parse("tr_j1")
            .unwrap()
            .extra_params(CounterVersion::V5)
            .is_empty());

        let ir_m1 = ReportRequest::parse("ir_m1").unwrap();
        assert!(!ir_m1.extra_params(CounterVersion::V5).is_empty());
        assert!(ir_m1.extra_params(CounterVersion::V51).is_empty());
    }
}
