//! COUNTER 5 tabular (CSV/TSV) exports.
//!
//! A tabular export starts with a `key,value` header block terminated by a
//! blank line, followed by a table with one column per month.

use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::dates::MonthTokenCache;
use crate::error::{IngestError, Result};
use crate::project::check_id_types;
use crate::record::{IdentifierKind, UsageRecord};
use crate::report::{CounterVersion, ReportType, ReportVariant};

const IGNORED_COLUMNS: &[&str] = &["Reporting_Period_Total", "Publisher_ID", "Linking_ISSN"];

// dimensions that only exist in JSON item reports
const JSON_ONLY_DIMENSIONS: &[&str] = &["Article_Version", "Parent_Data_Type"];

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Metric,
    Organization,
    Title,
}

impl MetaField {
    fn from_column(name: &str) -> Option<Self> {
        match name {
            "Metric_Type" => Some(Self::Metric),
            "Organization" => Some(Self::Organization),
            "Database" | "Title" | "Item" => Some(Self::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Month(NaiveDate),
    Meta(MetaField),
    Dimension(String),
    Identifier(IdentifierKind),
    Ignored,
    Unknown,
}

/// Reader for tabular exports with a fixed delimiter.
#[derive(Debug, Clone, Copy)]
pub struct TabularReader {
    delimiter: u8,
}

impl Default for TabularReader {
    fn default() -> Self {
        Self::new(b',')
    }
}

impl TabularReader {
    #[must_use]
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Reader matching a file name: tab for `.tsv`, comma otherwise.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        let is_tsv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"));
        Self::new(if is_tsv { b'\t' } else { b',' })
    }

    /// Open and read the header of a tabular export.
    pub fn open(path: &Path) -> Result<TabularReport<File>> {
        Self::for_path(path).read(File::open(path)?)
    }

    /// Read the header block and column row; records stream afterwards.
    ///
    /// Fails with [`IngestError::UnsupportedReport`] for anything other than
    /// a release 5 DR, TR, PR, IR or IR_M1 export.
    pub fn read<R: Read>(&self, reader: R) -> Result<TabularReport<R>> {
        let mut buffered = BufReader::new(reader);
        let header = self.read_header(&mut buffered)?;

        let report_id = header.get("Report_ID").cloned().unwrap_or_default();
        let report_type = ReportType::from_code(&report_id)
            .filter(|report_type| report_type.code() == report_id)
            .ok_or(IngestError::UnsupportedReport {
                field: "report type",
                value: report_id,
            })?;
        let release = header.get("Release").cloned().unwrap_or_default();
        if release != "5" {
            return Err(IngestError::UnsupportedReport {
                field: "COUNTER release",
                value: release,
            });
        }

        let mut table = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(buffered);
        let names: Vec<String> = table
            .headers()?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();

        let variant = ReportVariant::new(CounterVersion::V5, report_type);
        let mut month_tokens = MonthTokenCache::new();
        let columns = names
            .iter()
            .map(|name| classify_column(name, variant, &mut month_tokens))
            .collect();

        Ok(TabularReport {
            header,
            variant,
            names,
            columns,
            rows: table.into_records(),
            pending: VecDeque::new(),
            finished: false,
        })
    }

    fn read_header<R: BufRead>(&self, reader: &mut R) -> Result<BTreeMap<String, String>> {
        let mut header = BTreeMap::new();
        let mut line = String::new();
        let mut first = true;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let text = if first {
                first = false;
                line.trim_start_matches(UTF8_BOM)
            } else {
                line.as_str()
            };

            let mut cells = csv::ReaderBuilder::new()
                .has_headers(false)
                .delimiter(self.delimiter)
                .flexible(true)
                .from_reader(text.as_bytes());
            let Some(cells) = cells.records().next().transpose()? else {
                break;
            };
            let key = cells.get(0).unwrap_or_default().trim();
            if key.is_empty() {
                break;
            }
            let value = cells.get(1).unwrap_or_default().trim();
            header.insert(key.to_string(), value.to_string());
        }
        Ok(header)
    }
}

fn classify_column(name: &str, variant: ReportVariant, months: &mut MonthTokenCache) -> Column {
    if let Some(month) = months.month(name) {
        return Column::Month(month);
    }
    if name.is_empty() || IGNORED_COLUMNS.contains(&name) {
        return Column::Ignored;
    }
    if let Some(meta) = MetaField::from_column(name) {
        return Column::Meta(meta);
    }
    if variant.dimensions().contains(&name) && !JSON_ONLY_DIMENSIONS.contains(&name) {
        return Column::Dimension(name.to_string());
    }
    if let Some(kind) = IdentifierKind::from_type(name) {
        return Column::Identifier(kind);
    }
    Column::Unknown
}

/// An opened tabular export, iterating over its usage records.
pub struct TabularReport<R> {
    header: BTreeMap<String, String>,
    variant: ReportVariant,
    names: Vec<String>,
    columns: Vec<Column>,
    rows: csv::StringRecordsIntoIter<BufReader<R>>,
    pending: VecDeque<UsageRecord>,
    finished: bool,
}

impl<R> TabularReport<R> {
    /// The `key,value` pairs preceding the table.
    #[must_use]
    pub fn header(&self) -> &BTreeMap<String, String> {
        &self.header
    }

    #[must_use]
    pub fn report_type(&self) -> ReportType {
        self.variant.report_type
    }

    /// Months that have a column in the table.
    #[must_use]
    pub fn months(&self) -> Vec<NaiveDate> {
        self.columns
            .iter()
            .filter_map(|column| match column {
                Column::Month(month) => Some(*month),
                _ => None,
            })
            .collect()
    }

    fn project_row(&self, row: &csv::StringRecord) -> Result<Vec<UsageRecord>> {
        let mut template = UsageRecord::new(0, NaiveDate::MIN);
        let mut monthly = Vec::new();
        let mut id_columns = Vec::new();

        for ((name, column), cell) in self.names.iter().zip(&self.columns).zip(row.iter()) {
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            match column {
                Column::Month(month) => {
                    let value = cell.parse::<u64>().map_err(|_| {
                        IngestError::format(
                            format!("Invalid count '{cell}' in column \"{name}\""),
                            row_content(&self.names, row).to_string(),
                        )
                    })?;
                    monthly.push((*month, value));
                }
                Column::Meta(MetaField::Metric) => template.metric = Some(cell.to_string()),
                Column::Meta(MetaField::Organization) => {
                    template.organization = Some(cell.to_string());
                }
                Column::Meta(MetaField::Title) => template.title = Some(cell.to_string()),
                Column::Dimension(dimension) => {
                    template
                        .dimension_data
                        .insert(dimension.clone(), cell.to_string());
                }
                Column::Identifier(kind) => {
                    id_columns.push(name.as_str());
                    template.title_ids.set(*kind, cell);
                }
                Column::Ignored => {}
                Column::Unknown => {
                    return Err(IngestError::format(
                        format!("Cannot interpret column \"{name}\""),
                        row_content(&self.names, row).to_string(),
                    ));
                }
            }
        }

        check_id_types(self.variant, id_columns, &row_content(&self.names, row))?;

        Ok(monthly
            .into_iter()
            .map(|(month, value)| {
                let mut record = template.clone();
                record.value = value;
                record.start = month;
                record
            })
            .collect())
    }
}

fn row_content(names: &[String], row: &csv::StringRecord) -> Value {
    Value::Object(
        names
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name.clone(), Value::String(cell.to_string())))
            .collect::<Map<String, Value>>(),
    )
}

impl<R: Read> Iterator for TabularReport<R> {
    type Item = Result<UsageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }
            let projected = match self.rows.next()? {
                Ok(row) => self.project_row(&row),
                Err(err) => Err(err.into()),
            };
            match projected {
                Ok(records) => self.pending.extend(records),
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
