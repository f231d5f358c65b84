//! Normalized usage records.
//!
//! Every ingestion path (SUSHI JSON of either release, tabular exports)
//! produces the same [`UsageRecord`] shape.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Identifier kinds a record may carry for a title or an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdentifierKind {
    #[serde(rename = "DOI")]
    Doi,
    #[serde(rename = "ISBN")]
    Isbn,
    #[serde(rename = "Online_ISSN")]
    OnlineIssn,
    #[serde(rename = "Print_ISSN")]
    PrintIssn,
    #[serde(rename = "Proprietary")]
    Proprietary,
    #[serde(rename = "URI")]
    Uri,
}

impl IdentifierKind {
    /// All kinds, ordered by their rendered name.
    pub const ALL: [Self; 6] = [
        Self::Doi,
        Self::Isbn,
        Self::OnlineIssn,
        Self::PrintIssn,
        Self::Proprietary,
        Self::Uri,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doi => "DOI",
            Self::Isbn => "ISBN",
            Self::OnlineIssn => "Online_ISSN",
            Self::PrintIssn => "Print_ISSN",
            Self::Proprietary => "Proprietary",
            Self::Uri => "URI",
        }
    }

    /// Map an identifier type as written in reports.
    ///
    /// `Proprietary_ID` is an alias of `Proprietary`. Matching ignores case.
    ///
    /// # Examples
    /// ```
    /// use counter_ingest::record::IdentifierKind;
    ///
    /// assert_eq!(IdentifierKind::from_type("Print_ISSN"), Some(IdentifierKind::PrintIssn));
    /// assert_eq!(IdentifierKind::from_type("Proprietary_ID"), Some(IdentifierKind::Proprietary));
    /// assert_eq!(IdentifierKind::from_type("Linking_ISSN"), None);
    /// ```
    #[must_use]
    pub fn from_type(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("Proprietary_ID") {
            return Some(Self::Proprietary);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers of a title or item, at most one value per kind.
///
/// Equality and iteration only consider populated kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none", default)]
    pub doi: Option<String>,
    #[serde(rename = "ISBN", skip_serializing_if = "Option::is_none", default)]
    pub isbn: Option<String>,
    #[serde(rename = "Online_ISSN", skip_serializing_if = "Option::is_none", default)]
    pub online_issn: Option<String>,
    #[serde(rename = "Print_ISSN", skip_serializing_if = "Option::is_none", default)]
    pub print_issn: Option<String>,
    #[serde(rename = "Proprietary", skip_serializing_if = "Option::is_none", default)]
    pub proprietary: Option<String>,
    #[serde(rename = "URI", skip_serializing_if = "Option::is_none", default)]
    pub uri: Option<String>,
}

impl Identifiers {
    fn slot(&self, kind: IdentifierKind) -> &Option<String> {
        match kind {
            IdentifierKind::Doi => &self.doi,
            IdentifierKind::Isbn => &self.isbn,
            IdentifierKind::OnlineIssn => &self.online_issn,
            IdentifierKind::PrintIssn => &self.print_issn,
            IdentifierKind::Proprietary => &self.proprietary,
            IdentifierKind::Uri => &self.uri,
        }
    }

    fn slot_mut(&mut self, kind: IdentifierKind) -> &mut Option<String> {
        match kind {
            IdentifierKind::Doi => &mut self.doi,
            IdentifierKind::Isbn => &mut self.isbn,
            IdentifierKind::OnlineIssn => &mut self.online_issn,
            IdentifierKind::PrintIssn => &mut self.print_issn,
            IdentifierKind::Proprietary => &mut self.proprietary,
            IdentifierKind::Uri => &mut self.uri,
        }
    }

    #[must_use]
    pub fn get(&self, kind: IdentifierKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    /// Store a value, replacing any previous value of the same kind.
    pub fn set(&mut self, kind: IdentifierKind, value: impl Into<String>) {
        *self.slot_mut(kind) = Some(value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Populated identifiers, ordered by kind name.
    pub fn iter(&self) -> impl Iterator<Item = (IdentifierKind, &str)> {
        IdentifierKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|value| (kind, value)))
    }
}

/// An author of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(rename = "ISNI", skip_serializing_if = "Option::is_none", default)]
    pub isni: Option<String>,
    #[serde(rename = "ORCID", skip_serializing_if = "Option::is_none", default)]
    pub orcid: Option<String>,
}

impl Author {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isni: None,
            orcid: None,
        }
    }

    /// Parse a contributor identifier such as `ORCID:0000-0001-2345-6789`.
    ///
    /// Only `ISNI:` and `ORCID:` prefixes are recognized; anything else
    /// leaves the author without an identifier.
    #[must_use]
    pub fn with_identifier(name: impl Into<String>, identifier: &str) -> Self {
        let mut author = Self::new(name);
        let (kind, value) = identifier.split_once(':').unwrap_or((identifier, ""));
        match kind {
            "ISNI" => author.isni = Some(value.to_string()),
            "ORCID" => author.orcid = Some(value.to_string()),
            _ => {}
        }
        author
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(isni) = &self.isni {
            write!(f, " (ISNI:{isni})")?;
        } else if let Some(orcid) = &self.orcid {
            write!(f, " (ORCID:{orcid})")?;
        }
        Ok(())
    }
}

/// One usage count for one month (or period) and one combination of
/// title, item, dimensions and metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub value: u64,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub title: Option<String>,
    pub title_ids: Identifiers,
    /// Item name, only set for item reports.
    pub item: Option<String>,
    pub item_ids: Identifiers,
    pub item_publication_date: Option<String>,
    pub item_authors: Option<Vec<Author>>,
    /// Dimension values keyed by dimension name (`Access_Type`, `YOP`, ...).
    pub dimension_data: BTreeMap<String, String>,
    pub metric: Option<String>,
    pub organization: Option<String>,
}

impl UsageRecord {
    /// A record with only the mandatory parts set.
    #[must_use]
    pub fn new(value: u64, start: NaiveDate) -> Self {
        Self {
            value,
            start,
            end: None,
            title: None,
            title_ids: Identifiers::default(),
            item: None,
            item_ids: Identifiers::default(),
            item_publication_date: None,
            item_authors: None,
            dimension_data: BTreeMap::new(),
            metric: None,
            organization: None,
        }
    }

    /// Flat projection in [`CSV_COLUMNS`] order.
    #[must_use]
    pub fn as_csv(&self) -> [String; 12] {
        [
            format_date(Some(self.start)),
            format_date(self.end),
            self.organization.clone().unwrap_or_default(),
            self.title.clone().unwrap_or_default(),
            join_pairs(self.title_ids.iter().map(|(k, v)| (k.as_str(), v))),
            self.item.clone().unwrap_or_default(),
            join_pairs(self.item_ids.iter().map(|(k, v)| (k.as_str(), v))),
            self.item_publication_date.clone().unwrap_or_default(),
            self.item_authors
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("|"),
            join_pairs(
                self.dimension_data
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            ),
            self.metric.clone().unwrap_or_default(),
            self.value.to_string(),
        ]
    }
}

/// Column names of [`UsageRecord::as_csv`].
pub const CSV_COLUMNS: [&str; 12] = [
    "start",
    "end",
    "organization",
    "title",
    "title_ids",
    "item",
    "item_ids",
    "item_publication_date",
    "authors",
    "dimension_data",
    "metric",
    "value",
];

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// callers pass pairs already sorted by key
fn join_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(key, value)| format!("{key}:{value}"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Write records as CSV with a header row.
///
/// Stops at the first failed record and returns its error. Returns the
/// number of records written otherwise.
pub fn write_records_csv<W, I>(writer: W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<UsageRecord>>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_COLUMNS)?;
    let mut written = 0;
    for record in records {
        csv_writer.write_record(record?.as_csv())?;
        written += 1;
    }
    csv_writer.flush()?;
    Ok(written)
}
