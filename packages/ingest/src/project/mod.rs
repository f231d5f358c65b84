//! Record projection: raw report items to [`UsageRecord`]s.
//!
//! Each release has its own item layout ([`counter5`], [`counter51`]); the
//! report variant selects dimensions, identifier whitelist and title source.

pub mod counter5;
pub mod counter51;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Read;

use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::ingest::ReportItems;
use crate::record::{Identifiers, UsageRecord};
use crate::report::{CounterVersion, ReportVariant};

/// Project one raw report item.
///
/// Fails when the item carries identifier types outside the variant's
/// whitelist or lacks the structure its release requires.
pub fn project_item(variant: ReportVariant, item: &Value) -> Result<Vec<UsageRecord>> {
    match variant.version {
        CounterVersion::V5 => counter5::project_item(variant, item),
        CounterVersion::V51 => counter51::project_item(variant, item),
    }
}

/// Lazy stream of usage records over report items.
///
/// The first failure ends the stream: no records are produced for the
/// failing item or any item after it.
pub struct RecordStream<R: Read> {
    items: ReportItems<R>,
    variant: ReportVariant,
    pending: VecDeque<UsageRecord>,
    finished: bool,
}

impl<R: Read> RecordStream<R> {
    #[must_use]
    pub fn new(items: ReportItems<R>, variant: ReportVariant) -> Self {
        Self {
            items,
            variant,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    #[must_use]
    pub fn variant(&self) -> ReportVariant {
        self.variant
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<UsageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }
            let projected = match self.items.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(item) => item.and_then(|item| project_item(self.variant, &item)),
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

/// Render a scalar JSON value as text; `None` for null and containers.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text stored under `key` in an object.
pub(crate) fn text_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

/// Fail when any of `id_types` falls outside the variant's whitelist.
pub(crate) fn check_id_types<'a>(
    variant: ReportVariant,
    id_types: impl IntoIterator<Item = &'a str>,
    content: &Value,
) -> Result<()> {
    let extra: BTreeSet<String> = id_types
        .into_iter()
        .filter(|id_type| !variant.allows_id(id_type))
        .map(str::to_lowercase)
        .collect();
    if extra.is_empty() {
        return Ok(());
    }
    let names = extra.into_iter().collect::<Vec<_>>().join(", ");
    Err(IngestError::format(
        format!("Extra IDs not allowed {{{names}}}"),
        content.to_string(),
    ))
}

/// Collect allowed identifiers from `(type, value)` pairs.
pub(crate) fn collect_ids<'a>(
    variant: ReportVariant,
    pairs: impl IntoIterator<Item = (&'a str, &'a Value)>,
) -> Identifiers {
    let mut ids = Identifiers::default();
    for (id_type, value) in pairs {
        if let (Some(kind), Some(value)) = (variant.identifier_kind(id_type), scalar_text(value)) {
            ids.set(kind, value);
        }
    }
    ids
}

/// Interpret a count as a non-negative integer.
pub(crate) fn parse_count(value: &Value, content: &Value) -> Result<u64> {
    let count = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| {
        IngestError::format(format!("Invalid count {value}"), content.to_string())
    })
}

/// Dimension values found in `sources`, earlier sources taking precedence.
pub(crate) fn lookup_dimensions(
    dimensions: &[&str],
    sources: &[&Value],
) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();
    for dimension in dimensions {
        if let Some(value) = sources.iter().find_map(|source| source.get(*dimension)) {
            if let Some(text) = scalar_text(value) {
                found.insert((*dimension).to_string(), text);
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportType;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_check_id_types_names_offenders() {
        let variant = ReportVariant::new(CounterVersion::V5, ReportType::Pr);
        let item = json!({"Platform": "X"});
        assert!(check_id_types(variant, ["Proprietary"], &item).is_ok());

        let err = check_id_types(variant, ["DOI", "Proprietary", "ISBN"], &item).unwrap_err();
        assert_eq!(err.to_string(), "Extra IDs not allowed {doi, isbn}");
        assert_eq!(err.content(), Some(r#"{"Platform":"X"}"#));
    }

    #[test]
    fn test_parse_count() {
        let item = json!({});
        assert_eq!(parse_count(&json!(10), &item).unwrap(), 10);
        assert_eq!(parse_count(&json!("7"), &item).unwrap(), 7);
        assert_eq!(parse_count(&json!(3.0), &item).unwrap(), 3);
        assert!(parse_count(&json!(-1), &item).is_err());
        assert!(parse_count(&json!("many"), &item).is_err());
        assert!(parse_count(&json!(null), &item).is_err());
    }

    #[test]
    fn test_lookup_dimensions_precedence() {
        let first = json!({"Platform": "A", "YOP": 2019});
        let second = json!({"Platform": "B", "Publisher": "P", "Data_Type": null});
        let dims = lookup_dimensions(
            &["Platform", "Publisher", "YOP", "Data_Type"],
            &[&first, &second],
        );
        assert_eq!(dims.get("Platform").map(String::as_str), Some("A"));
        assert_eq!(dims.get("Publisher").map(String::as_str), Some("P"));
        assert_eq!(dims.get("YOP").map(String::as_str), Some("2019"));
        assert!(!dims.contains_key("Data_Type"));
    }
}
