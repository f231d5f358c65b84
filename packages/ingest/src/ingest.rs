//! Report ingestion: shape detection, header and exception extraction, and
//! a lazy item stream over COUNTER JSON documents.
//!
//! The input is read in several passes. Every pass starts from byte 0 and
//! leaves the stream rewound, so the passes never interleave. Report items
//! are never materialized as a whole; [`ReportItems`] pulls them one at a
//! time from the stream once the checks are done.

use std::io::{BufReader, Read, Seek, SeekFrom};

use chrono::NaiveDate;
use serde_json::{Map, Value};
use struson::reader::{JsonReader, JsonStreamReader, ValueType};
use tracing::{debug, warn};

use crate::dates::{date_range, parse_loose_date};
use crate::error::{IngestError, Result};
use crate::exception::{extract_errors, ProtocolError, SemanticError, TransportError};
use crate::project::RecordStream;
use crate::report::{CounterVersion, ReportType, ReportVariant};
use crate::severity::{ErrorCode, Severity};

const ITEMS_PATH: &[&str] = &["Report_Items"];
const BODY_ITEMS_PATH: &[&str] = &["body", "Report_Items"];
const HEADER_PATH: &[&str] = &["Report_Header"];
const BODY_HEADER_PATH: &[&str] = &["body", "Report_Header"];

/// Conditions reported by the server while reading one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub errors: Vec<ProtocolError>,
    pub warnings: Vec<SemanticError>,
    pub infos: Vec<SemanticError>,
    /// The server is still preparing the data; retry the request later.
    pub queued: bool,
}

impl Diagnostics {
    /// Whether anything at all was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.infos.is_empty()
    }

    /// File exceptions by severity.
    pub fn file(&mut self, exceptions: Vec<SemanticError>) {
        if exceptions.iter().any(|e| e.is(ErrorCode::PreparingData)) {
            self.queued = true;
        }
        for exception in exceptions {
            match exception.severity {
                Severity::Error => self.errors.push(ProtocolError::Semantic(exception)),
                Severity::Warning => self.warnings.push(exception),
                Severity::Info => self.infos.push(exception),
            }
        }
    }

    pub fn push_transport(&mut self, error: TransportError) {
        self.errors.push(ProtocolError::Transport(error));
    }

    /// Whether a semantic exception with `code` was reported.
    #[must_use]
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.is(code))
            || self.warnings.iter().chain(&self.infos).any(|e| e.is(code))
    }

    /// Turn reported errors into a terminal failure.
    ///
    /// Warnings are only logged. A single error is raised as is; several
    /// errors are merged into one failure.
    pub fn validate(&self) -> Result<()> {
        for warning in &self.warnings {
            warn!(code = %warning.code, "{warning}");
        }

        match self.errors.as_slice() {
            [] => Ok(()),
            [error] => Err(IngestError::Sushi {
                message: error.to_string(),
                content: vec![error.data().to_string()],
            }),
            errors => Err(IngestError::Sushi {
                message: errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
                content: errors.iter().map(|e| e.data().to_string()).collect(),
            }),
        }
    }
}

/// Outcome of reading one document.
pub struct ReadResult<R: Read> {
    pub version: CounterVersion,
    /// `Report_Header` (possibly recovered from a fallback location), or empty.
    pub header: Map<String, Value>,
    pub items: ReportItems<R>,
    pub diagnostics: Diagnostics,
    /// At least one report item is present.
    pub record_found: bool,
    pub http_status: Option<u16>,
}

impl<R: Read> ReadResult<R> {
    #[must_use]
    pub fn errors(&self) -> &[ProtocolError] {
        &self.diagnostics.errors
    }

    #[must_use]
    pub fn warnings(&self) -> &[SemanticError] {
        &self.diagnostics.warnings
    }

    #[must_use]
    pub fn infos(&self) -> &[SemanticError] {
        &self.diagnostics.infos
    }

    #[must_use]
    pub fn queued(&self) -> bool {
        self.diagnostics.queued
    }

    pub fn validate(&self) -> Result<()> {
        self.diagnostics.validate()
    }

    /// Months covered according to `Report_Filters` in the header.
    ///
    /// Release 5 lists filters as `{Name, Value}` pairs, release 5.1 as an
    /// object; both shapes are accepted. Empty unless both dates parse.
    #[must_use]
    pub fn months(&self) -> Vec<NaiveDate> {
        let Some(filters) = self.header.get("Report_Filters") else {
            return Vec::new();
        };
        let (begin, end) = match filters {
            Value::Array(pairs) => (
                named_filter(pairs, "Begin_Date"),
                named_filter(pairs, "End_Date"),
            ),
            Value::Object(map) => (
                map.get("Begin_Date").and_then(Value::as_str),
                map.get("End_Date").and_then(Value::as_str),
            ),
            _ => (None, None),
        };
        match (begin.and_then(parse_loose_date), end.and_then(parse_loose_date)) {
            (Some(begin), Some(end)) => date_range(begin, end),
            _ => Vec::new(),
        }
    }
}

impl<R: Read> ReadResult<R> {
    /// Project the report items into usage records of `report_type`.
    pub fn into_records(self, report_type: ReportType) -> RecordStream<R> {
        RecordStream::new(self.items, ReportVariant::new(self.version, report_type))
    }
}

fn named_filter<'a>(pairs: &'a [Value], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .rev()
        .find(|pair| pair.get("Name").and_then(Value::as_str) == Some(name))
        .and_then(|pair| pair.get("Value"))
        .and_then(Value::as_str)
}

/// Lazy sequence of raw report items.
pub struct ReportItems<R: Read> {
    json: Option<JsonStreamReader<R>>,
}

impl<R: Read> ReportItems<R> {
    #[must_use]
    pub fn empty() -> Self {
        Self { json: None }
    }
}

impl<R: Read> ReportItems<R> {
    /// Stream the elements of the array found under `path`.
    fn open(reader: R, path: &[&str]) -> Result<Self> {
        let mut json = JsonStreamReader::new(reader);
        if !seek_path(&mut json, path)? || json.peek()? != ValueType::Array {
            return Ok(Self::empty());
        }
        json.begin_array()?;
        Ok(Self { json: Some(json) })
    }
}

impl<R: Read> Iterator for ReportItems<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let json = self.json.as_mut()?;
        let item = match json.has_next() {
            Ok(true) => json.deserialize_next::<Value>().map_err(IngestError::from),
            Ok(false) => {
                self.json = None;
                return None;
            }
            Err(err) => Err(err.into()),
        };
        if item.is_err() {
            self.json = None;
        }
        Some(item)
    }
}

/// Read a COUNTER JSON document of the given release.
///
/// Exceptions found in the document are filed on the result rather than
/// returned as errors. An `Err` means the document cannot be a COUNTER
/// report at all (missing mandatory header fields, no header and no items,
/// malformed JSON).
///
/// `http_status` is attached to the transport error raised for non-JSON
/// bodies.
pub fn read_report<R: Read + Seek>(
    mut reader: R,
    version: CounterVersion,
    http_status: Option<u16>,
) -> Result<ReadResult<R>> {
    let mut result = ReadResult {
        version,
        header: Map::new(),
        items: ReportItems::empty(),
        diagnostics: Diagnostics::default(),
        record_found: false,
        http_status,
    };

    match first_significant_byte(&mut reader)? {
        Some(b'[') => {
            let errors: Value = serde_json::from_reader(BufReader::new(&mut reader))?;
            result.diagnostics.file(extract_errors(&errors));
        }
        Some(b'"') => {
            let encoded: String = serde_json::from_reader(BufReader::new(&mut reader))?;
            let document: Value = serde_json::from_str(&encoded)?;
            debug!("document is a JSON encoded string");
            result.diagnostics.file(extract_errors(&document));
            if let Some(Value::Object(header)) = document.get("Report_Header") {
                result.header = header.clone();
            }
        }
        Some(b'{') => {
            let items_path = read_structured(&mut reader, version, &mut result)?;
            rewind(&mut reader)?;
            if let Some(path) = items_path {
                result.items = ReportItems::open(reader, path)?;
            }
            return Ok(result);
        }
        _ => result.diagnostics.push_transport(TransportError {
            http_status,
            message: "Non SUSHI data returned".to_string(),
        }),
    }

    rewind(&mut reader)?;
    Ok(result)
}

/// The `{` path. Returns where the items live when there are any.
fn read_structured<R: Read + Seek, T: Read>(
    reader: &mut R,
    version: CounterVersion,
    result: &mut ReadResult<T>,
) -> Result<Option<&'static [&'static str]>> {
    let mut items_path = None;
    for path in [ITEMS_PATH, BODY_ITEMS_PATH] {
        if has_first_item(reader, path)? {
            if path == BODY_ITEMS_PATH {
                debug!("report items found under body wrapper");
            }
            items_path = Some(path);
            break;
        }
    }
    result.record_found = items_path.is_some();

    let mut header = read_object(reader, HEADER_PATH)?.unwrap_or_default();
    if header.is_empty() {
        if let Some(wrapped) = read_object(reader, BODY_HEADER_PATH)? {
            debug!("report header found under body wrapper");
            header = wrapped;
        }
    }

    if !result.record_found && header.is_empty() {
        debug!("no items and no header, reading whole document as header");
        if let Some(document) = read_object(reader, &[])? {
            header = document;
        }
    }

    if !header.is_empty() {
        let header_value = Value::Object(header);
        result.diagnostics.file(extract_errors(&header_value));
        if let Value::Object(header) = header_value {
            if result.diagnostics.is_empty() {
                check_header(&header, version, reader)?;
            }
            result.header = header;
        }
    } else if !result.record_found {
        return Err(IngestError::format("Incorrect format", read_raw(reader)?));
    }

    if (result.header.is_empty() || !result.record_found) && result.diagnostics.is_empty() {
        debug!("scanning document root for exceptions");
        for path in [&["Exceptions"][..], &["body", "Exceptions"][..]] {
            if let Some(list @ Value::Array(_)) = read_value(reader, path)? {
                result.diagnostics.file(extract_errors(&list));
            }
        }
        for path in [&["Exception"][..], &["body", "Exception"][..]] {
            if let Some(object) = read_object(reader, path)? {
                result.diagnostics.file(extract_errors(&Value::Object(object)));
            }
        }
    }

    Ok(items_path)
}

fn check_header<R: Read + Seek>(
    header: &Map<String, Value>,
    version: CounterVersion,
    reader: &mut R,
) -> Result<()> {
    let present: Vec<String> = header.keys().map(|key| key.to_lowercase()).collect();
    let complete = version
        .mandatory_header_fields()
        .iter()
        .all(|field| present.iter().any(|key| key == field));
    if complete {
        Ok(())
    } else {
        Err(IngestError::format("Incorrect format", read_raw(reader)?))
    }
}

fn rewind<R: Seek>(reader: &mut R) -> Result<()> {
    reader.seek(SeekFrom::Start(0))?;
    Ok(())
}

fn first_significant_byte<R: Read + Seek>(reader: &mut R) -> Result<Option<u8>> {
    rewind(reader)?;
    let mut buf = BufReader::new(&mut *reader);
    let mut byte = [0u8; 1];
    let first = loop {
        if buf.read(&mut byte)? == 0 {
            break None;
        }
        if !byte[0].is_ascii_whitespace() {
            break Some(byte[0]);
        }
    };
    drop(buf);
    rewind(reader)?;
    Ok(first)
}

fn read_raw<R: Read + Seek>(reader: &mut R) -> Result<String> {
    rewind(reader)?;
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    rewind(reader)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Move `json` onto the value stored under `path` (object keys, exact match).
fn seek_path<R: Read>(json: &mut JsonStreamReader<R>, path: &[&str]) -> Result<bool> {
    for segment in path {
        if json.peek()? != ValueType::Object {
            return Ok(false);
        }
        json.begin_object()?;
        let mut found = false;
        while json.has_next()? {
            if json.next_name()? == *segment {
                found = true;
                break;
            }
            json.skip_value()?;
        }
        if !found {
            return Ok(false);
        }
    }
    Ok(true)
}

fn has_first_item<R: Read + Seek>(reader: &mut R, path: &[&str]) -> Result<bool> {
    rewind(reader)?;
    let found = {
        let mut json = JsonStreamReader::new(&mut *reader);
        if seek_path(&mut json, path)? && json.peek()? == ValueType::Array {
            json.begin_array()?;
            json.has_next()?
        } else {
            false
        }
    };
    rewind(reader)?;
    Ok(found)
}

fn read_value<R: Read + Seek>(reader: &mut R, path: &[&str]) -> Result<Option<Value>> {
    rewind(reader)?;
    let value = {
        let mut json = JsonStreamReader::new(&mut *reader);
        if seek_path(&mut json, path)? {
            Some(json.deserialize_next::<Value>()?)
        } else {
            None
        }
    };
    rewind(reader)?;
    Ok(value)
}

fn read_object<R: Read + Seek>(
    reader: &mut R,
    path: &[&str],
) -> Result<Option<Map<String, Value>>> {
    Ok(match read_value(reader, path)? {
        Some(Value::Object(object)) => Some(object),
        _ => None,
    })
}
