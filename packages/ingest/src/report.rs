//! Report catalogue: protocol versions, report types and their layouts.
//!
//! Each `(version, report type)` pair resolves through [`ReportVariant::spec`]
//! to a static [`VariantSpec`] describing what the projector may read from
//! report items.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::record::IdentifierKind;

/// COUNTER release of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterVersion {
    #[serde(rename = "5")]
    V5,
    #[serde(rename = "5.1")]
    V51,
}

impl CounterVersion {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V5 => "5",
            Self::V51 => "5.1",
        }
    }

    /// Header keys (lowercase) a valid report header must carry.
    #[must_use]
    pub fn mandatory_header_fields(&self) -> &'static [&'static str] {
        match self {
            Self::V5 => &["report_id", "customer_id"],
            Self::V51 => &["release", "report_id", "report_name"],
        }
    }
}

impl fmt::Display for CounterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterVersion {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "5" | "5.0" => Ok(Self::V5),
            "5.1" => Ok(Self::V51),
            other => Err(IngestError::UnsupportedReport {
                field: "COUNTER release",
                value: other.to_string(),
            }),
        }
    }
}

/// Report layouts the projector knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "TR")]
    Tr,
    #[serde(rename = "DR")]
    Dr,
    #[serde(rename = "PR")]
    Pr,
    #[serde(rename = "IR")]
    Ir,
    #[serde(rename = "IR_M1")]
    IrM1,
}

impl ReportType {
    pub const ALL: [Self; 5] = [Self::Tr, Self::Dr, Self::Pr, Self::Ir, Self::IrM1];

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tr => "TR",
            Self::Dr => "DR",
            Self::Pr => "PR",
            Self::Ir => "IR",
            Self::IrM1 => "IR_M1",
        }
    }

    /// Look up a report code such as `TR` or `ir_m1`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|report_type| report_type.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Whether items of this report describe individual items with a parent title.
    #[must_use]
    pub fn is_item_report(&self) -> bool {
        matches!(self, Self::Ir | Self::IrM1)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ReportType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| IngestError::UnsupportedReport {
            field: "report type",
            value: s.to_string(),
        })
    }
}

/// Static description of one report layout.
#[derive(Debug)]
pub struct VariantSpec {
    /// Dimension names read from items.
    pub dimensions: &'static [&'static str],
    /// Identifier types accepted in `Item_ID`.
    pub item_ids: &'static [&'static str],
    /// Key holding the title name; `None` when the report has no titles.
    pub title_key: Option<&'static str>,
    /// Query parameters requested from the server for this layout.
    pub extra_params: &'static [(&'static str, &'static str)],
}

const PLATFORM_IDS: &[&str] = &["Proprietary", "Proprietary_ID"];
const TITLE_IDS: &[&str] = &[
    "DOI",
    "Online_ISSN",
    "Print_ISSN",
    "ISBN",
    "Proprietary",
    "Proprietary_ID",
    "URI",
];

const TR_5: VariantSpec = VariantSpec {
    dimensions: &[
        "Access_Type",
        "Access_Method",
        "Data_Type",
        "Section_Type",
        "YOP",
        "Publisher",
        "Platform",
    ],
    item_ids: TITLE_IDS,
    title_key: Some("Title"),
    extra_params: &[(
        "attributes_to_show",
        "YOP|Access_Method|Access_Type|Data_Type|Section_Type",
    )],
};

const TR_51: VariantSpec = VariantSpec {
    dimensions: &[
        "Access_Type",
        "Access_Method",
        "Data_Type",
        "YOP",
        "Publisher",
        "Platform",
    ],
    item_ids: TITLE_IDS,
    title_key: Some("Title"),
    extra_params: &[("attributes_to_show", "YOP|Access_Method|Access_Type")],
};

const DR_5: VariantSpec = VariantSpec {
    dimensions: &["Access_Method", "Data_Type", "Publisher", "Platform"],
    item_ids: PLATFORM_IDS,
    title_key: Some("Database"),
    extra_params: &[("attributes_to_show", "Access_Method|Data_Type")],
};

const DR_51: VariantSpec = VariantSpec {
    extra_params: &[("attributes_to_show", "Access_Method")],
    ..DR_5
};

const PR_5: VariantSpec = VariantSpec {
    dimensions: &["Access_Method", "Data_Type", "Platform"],
    item_ids: PLATFORM_IDS,
    title_key: None,
    extra_params: &[("attributes_to_show", "Access_Method|Data_Type")],
};

const PR_51: VariantSpec = VariantSpec {
    extra_params: &[("attributes_to_show", "Access_Method")],
    ..PR_5
};

const IR_DIMENSIONS: &[&str] = &[
    "Access_Type",
    "Access_Method",
    "Data_Type",
    "YOP",
    "Publisher",
    "Platform",
    "Article_Version",
    "Parent_Data_Type",
];

const IR_5: VariantSpec = VariantSpec {
    dimensions: IR_DIMENSIONS,
    item_ids: TITLE_IDS,
    title_key: Some("Title"),
    extra_params: &[
        (
            "attributes_to_show",
            "Authors|Publication_Date|YOP|Access_Method|Access_Type|Data_Type|Article_Version",
        ),
        ("include_parent_details", "True"),
    ],
};

const IR_51: VariantSpec = VariantSpec {
    extra_params: &[
        (
            "attributes_to_show",
            "Authors|Publication_Date|YOP|Access_Method|Access_Type|Article_Version",
        ),
        ("include_parent_details", "True"),
    ],
    ..IR_5
};

const IR_M1_5: VariantSpec = VariantSpec {
    dimensions: &["Publisher", "Platform"],
    ..IR_5
};

const IR_M1_51: VariantSpec = VariantSpec {
    dimensions: &["Publisher", "Platform", "Data_Type"],
    extra_params: &[],
    ..IR_5
};

/// One concrete report layout: a report type under a protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportVariant {
    pub version: CounterVersion,
    pub report_type: ReportType,
}

impl ReportVariant {
    #[must_use]
    pub fn new(version: CounterVersion, report_type: ReportType) -> Self {
        Self {
            version,
            report_type,
        }
    }

    /// Layout table entry for this variant.
    #[must_use]
    pub fn spec(&self) -> &'static VariantSpec {
        match (self.version, self.report_type) {
            (CounterVersion::V5, ReportType::Tr) => &TR_5,
            (CounterVersion::V5, ReportType::Dr) => &DR_5,
            (CounterVersion::V5, ReportType::Pr) => &PR_5,
            (CounterVersion::V5, ReportType::Ir) => &IR_5,
            (CounterVersion::V5, ReportType::IrM1) => &IR_M1_5,
            (CounterVersion::V51, ReportType::Tr) => &TR_51,
            (CounterVersion::V51, ReportType::Dr) => &DR_51,
            (CounterVersion::V51, ReportType::Pr) => &PR_51,
            (CounterVersion::V51, ReportType::Ir) => &IR_51,
            (CounterVersion::V51, ReportType::IrM1) => &IR_M1_51,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> &'static [&'static str] {
        self.spec().dimensions
    }

    #[must_use]
    pub fn allowed_item_ids(&self) -> &'static [&'static str] {
        self.spec().item_ids
    }

    #[must_use]
    pub fn extra_params(&self) -> &'static [(&'static str, &'static str)] {
        self.spec().extra_params
    }

    /// Whether `id_type` may appear in `Item_ID` (case-insensitive).
    #[must_use]
    pub fn allows_id(&self, id_type: &str) -> bool {
        self.allowed_item_ids()
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(id_type))
    }

    /// Identifier kind for an allowed `Item_ID` type.
    #[must_use]
    pub fn identifier_kind(&self, id_type: &str) -> Option<IdentifierKind> {
        if self.allows_id(id_type) {
            IdentifierKind::from_type(id_type)
        } else {
            None
        }
    }

    /// Whether child items copy the parent's `Data_Type` into `Parent_Data_Type`.
    ///
    /// Release 5 IR_M1 rows carry it like IR; release 5.1 IR_M1 rows do not.
    #[must_use]
    pub fn propagates_parent_data_type(&self) -> bool {
        match self.report_type {
            ReportType::Ir => true,
            ReportType::IrM1 => self.version == CounterVersion::V5,
            _ => false,
        }
    }
}

impl fmt::Display for ReportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (COUNTER {})", self.report_type, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_version_parsing() {
        assert_eq!("5".parse::<CounterVersion>().unwrap(), CounterVersion::V5);
        assert_eq!("5.1".parse::<CounterVersion>().unwrap(), CounterVersion::V51);
        let err = "4".parse::<CounterVersion>().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported COUNTER release: '4'");
    }

    #[test]
    fn test_report_type_codes() {
        assert_eq!(ReportType::from_code("ir_m1"), Some(ReportType::IrM1));
        assert_eq!(ReportType::from_code(" TR "), Some(ReportType::Tr));
        assert_eq!(ReportType::from_code("JR1"), None);
        assert!("BR".parse::<ReportType>().is_err());
    }

    #[test]
    fn test_dimension_tables() {
        let tr5 = ReportVariant::new(CounterVersion::V5, ReportType::Tr);
        let tr51 = ReportVariant::new(CounterVersion::V51, ReportType::Tr);
        assert!(tr5.dimensions().contains(&"Section_Type"));
        assert!(!tr51.dimensions().contains(&"Section_Type"));

        let irm1 = ReportVariant::new(CounterVersion::V51, ReportType::IrM1);
        assert_eq!(irm1.dimensions(), &["Publisher", "Platform", "Data_Type"]);
        assert!(irm1.extra_params().is_empty());
        assert!(!irm1.propagates_parent_data_type());
        let irm1_5 = ReportVariant::new(CounterVersion::V5, ReportType::IrM1);
        assert!(irm1_5.propagates_parent_data_type());
        let pr5 = ReportVariant::new(CounterVersion::V5, ReportType::Pr);
        assert!(!pr5.propagates_parent_data_type());
    }

    #[test]
    fn test_identifier_whitelists() {
        let dr = ReportVariant::new(CounterVersion::V5, ReportType::Dr);
        assert!(dr.allows_id("proprietary_id"));
        assert!(!dr.allows_id("DOI"));
        assert_eq!(dr.identifier_kind("DOI"), None);
        assert_eq!(
            dr.identifier_kind("Proprietary_ID"),
            Some(IdentifierKind::Proprietary)
        );

        let ir = ReportVariant::new(CounterVersion::V51, ReportType::Ir);
        assert_eq!(ir.identifier_kind("URI"), Some(IdentifierKind::Uri));
        assert!(!ir.allows_id("Linking_ISSN"));
    }

    #[test]
    fn test_item_report_extras() {
        let ir = ReportVariant::new(CounterVersion::V5, ReportType::Ir);
        assert!(ir
            .extra_params()
            .contains(&("include_parent_details", "True")));
        let irm1 = ReportVariant::new(CounterVersion::V5, ReportType::IrM1);
        assert_eq!(irm1.extra_params(), ir.extra_params());
    }
}
