//! Release 5 item layout.
//!
//! Items carry `Performance` entries of `{Period, Instance[{Metric_Type, Count}]}`.
//! Item reports describe the parent title in `Item_Parent`, dates in
//! `Item_Dates` and contributors in `Item_Contributors`.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{check_id_types, collect_ids, parse_count, scalar_text, text_at};
use crate::dates::parse_loose_date;
use crate::error::{IngestError, Result};
use crate::record::{Author, Identifiers, UsageRecord};
use crate::report::{ReportType, ReportVariant};

pub fn project_item(variant: ReportVariant, item: &Value) -> Result<Vec<UsageRecord>> {
    check_id_types(variant, id_types(item.get("Item_ID")), item)?;

    let is_item_report = variant.report_type.is_item_report();
    let parent = item.get("Item_Parent");

    let title = match variant.report_type {
        ReportType::Ir | ReportType::IrM1 => Some(
            parent
                .and_then(|parent| text_at(parent, "Item_Name"))
                .unwrap_or_default(),
        ),
        _ => variant
            .spec()
            .title_key
            .and_then(|key| text_at(item, key)),
    };
    let title_ids = if is_item_report {
        item_ids(variant, parent.and_then(|parent| parent.get("Item_ID")))
    } else {
        item_ids(variant, item.get("Item_ID"))
    };

    let mut template = UsageRecord::new(0, chrono::NaiveDate::MIN);
    template.title = title;
    template.title_ids = title_ids;
    template.dimension_data = dimensions(variant, item);
    if is_item_report {
        template.item = Some(text_at(item, "Item").unwrap_or_default());
        template.item_ids = item_ids(variant, item.get("Item_ID"));
        template.item_publication_date = publication_date(item);
        template.item_authors = authors(item);
    }

    let mut records = Vec::new();
    for performance in array(item.get("Performance")) {
        let period = performance.get("Period");
        let start = period
            .and_then(|period| period.get("Begin_Date"))
            .and_then(Value::as_str)
            .and_then(parse_loose_date)
            .ok_or_else(|| {
                IngestError::format("Missing or invalid Begin_Date", performance.to_string())
            })?;
        let end = period
            .and_then(|period| period.get("End_Date"))
            .and_then(Value::as_str)
            .and_then(parse_loose_date);

        for instance in array(performance.get("Instance")) {
            let count = instance.get("Count").unwrap_or(&Value::Null);
            let mut record = template.clone();
            record.value = parse_count(count, instance)?;
            record.start = start;
            record.end = end;
            record.metric = text_at(instance, "Metric_Type");
            records.push(record);
        }
    }
    Ok(records)
}

fn array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(values)) => values,
        _ => &[],
    }
}

fn id_types(ids: Option<&Value>) -> impl Iterator<Item = &str> {
    array(ids)
        .iter()
        .filter_map(|id| id.get("Type").and_then(Value::as_str))
}

fn item_ids(variant: ReportVariant, ids: Option<&Value>) -> Identifiers {
    collect_ids(
        variant,
        array(ids).iter().filter_map(|id| {
            let id_type = id.get("Type").and_then(Value::as_str)?;
            Some((id_type, id.get("Value")?))
        }),
    )
}

/// Dimension values taken from the item itself, then from `Item_Attributes`.
fn dimensions(variant: ReportVariant, item: &Value) -> BTreeMap<String, String> {
    let attributes = array(item.get("Item_Attributes"));
    let mut found = BTreeMap::new();
    for dimension in variant.dimensions() {
        let value = match item.get(*dimension) {
            Some(direct) => scalar_text(direct),
            None => attributes
                .iter()
                .find(|attribute| {
                    attribute.get("Type").and_then(Value::as_str) == Some(*dimension)
                })
                .map(|attribute| text_at(attribute, "Value").unwrap_or_default()),
        };
        if let Some(value) = value {
            found.insert((*dimension).to_string(), value);
        }
    }

    if variant.propagates_parent_data_type() {
        if let Some(parent_type) = item
            .get("Item_Parent")
            .and_then(|parent| text_at(parent, "Data_Type"))
            .filter(|parent_type| !parent_type.is_empty())
        {
            found.insert("Parent_Data_Type".to_string(), parent_type);
        }
    }
    found
}

fn publication_date(item: &Value) -> Option<String> {
    array(item.get("Item_Dates"))
        .iter()
        .find(|date| date.get("Type").and_then(Value::as_str) == Some("Publication_Date"))
        .map(|date| text_at(date, "Value").unwrap_or_default())
}

fn authors(item: &Value) -> Option<Vec<Author>> {
    let authors: Vec<Author> = array(item.get("Item_Contributors"))
        .iter()
        .filter(|contributor| contributor.get("Type").and_then(Value::as_str) == Some("Author"))
        .filter_map(|contributor| {
            let name = text_at(contributor, "Name").filter(|name| !name.is_empty())?;
            Some(match contributor.get("Identifier").and_then(Value::as_str) {
                Some(identifier) if !identifier.is_empty() => {
                    Author::with_identifier(name, identifier)
                }
                _ => Author::new(name),
            })
        })
        .collect();
    (!authors.is_empty()).then_some(authors)
}
