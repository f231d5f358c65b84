//! Release 5.1 item layout.
//!
//! Counts live in `Attribute_Performance[{<attributes>, Performance:
//! {<metric>: {"YYYY-MM": count}}}]`. Item reports nest the individual items
//! under the parent title in `Items`, each with its own attribute
//! performance. `Item_ID` is an object keyed by identifier type.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{check_id_types, collect_ids, lookup_dimensions, parse_count, text_at};
use crate::error::{IngestError, Result};
use crate::record::{Author, Identifiers, UsageRecord};
use crate::report::ReportVariant;

pub fn project_item(variant: ReportVariant, report_item: &Value) -> Result<Vec<UsageRecord>> {
    let mut template = UsageRecord::new(0, NaiveDate::MIN);
    template.title = variant
        .spec()
        .title_key
        .and_then(|key| text_at(report_item, key));
    template.title_ids = item_ids(variant, report_item);

    let mut records = Vec::new();
    if !variant.report_type.is_item_report() {
        check_item(variant, report_item)?;
        for performance in array(report_item.get("Attribute_Performance")) {
            template.dimension_data =
                lookup_dimensions(variant.dimensions(), &[report_item, performance]);
            expand(&template, performance, &mut records)?;
        }
        return Ok(records);
    }

    let parent_data_type = variant
        .propagates_parent_data_type()
        .then(|| text_at(report_item, "Data_Type"))
        .flatten()
        .filter(|data_type| !data_type.is_empty());

    for item in array(report_item.get("Items")) {
        check_item(variant, item)?;
        template.item = text_at(item, "Item");
        template.item_ids = item_ids(variant, item);
        template.item_publication_date = text_at(item, "Publication_Date");
        template.item_authors = authors(item);

        for performance in array(item.get("Attribute_Performance")) {
            template.dimension_data =
                lookup_dimensions(variant.dimensions(), &[performance, item, report_item]);
            if let Some(parent_data_type) = &parent_data_type {
                template
                    .dimension_data
                    .insert("Parent_Data_Type".to_string(), parent_data_type.clone());
            }
            expand(&template, performance, &mut records)?;
        }
    }
    Ok(records)
}

/// Require `Attribute_Performance` and whitelisted identifiers.
fn check_item(variant: ReportVariant, item: &Value) -> Result<()> {
    let has_performance = item.as_object().is_some_and(|object| {
        object
            .keys()
            .any(|key| key.eq_ignore_ascii_case("Attribute_Performance"))
    });
    if !has_performance {
        return Err(IngestError::format(
            "Missing 'Attribute_Performance' field",
            item.to_string(),
        ));
    }

    check_id_types(variant, id_types(item), item)?;
    for performance in array(item.get("Attribute_Performance")) {
        check_id_types(variant, id_types(performance), performance)?;
    }
    Ok(())
}

/// One record per (metric, month) of an attribute performance entry.
fn expand(
    template: &UsageRecord,
    performance: &Value,
    records: &mut Vec<UsageRecord>,
) -> Result<()> {
    let Some(Value::Object(metrics)) = performance.get("Performance") else {
        return Ok(());
    };
    for (metric, months) in metrics {
        let Value::Object(months) = months else {
            continue;
        };
        for (month, count) in months {
            let start = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
                .map_err(|_| {
                    IngestError::format(format!("Invalid month '{month}'"), performance.to_string())
                })?;
            let mut record = template.clone();
            record.value = parse_count(count, performance)?;
            record.start = start;
            record.metric = Some(metric.clone());
            records.push(record);
        }
    }
    Ok(())
}

fn array(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(values)) => values,
        _ => &[],
    }
}

fn id_map(value: &Value) -> Option<&Map<String, Value>> {
    value.get("Item_ID").and_then(Value::as_object)
}

fn id_types(value: &Value) -> impl Iterator<Item = &str> {
    id_map(value).into_iter().flat_map(|ids| ids.keys().map(String::as_str))
}

fn item_ids(variant: ReportVariant, item: &Value) -> Identifiers {
    collect_ids(
        variant,
        id_map(item)
            .into_iter()
            .flatten()
            .map(|(id_type, value)| (id_type.as_str(), value)),
    )
}

fn authors(item: &Value) -> Option<Vec<Author>> {
    let authors: Vec<Author> = array(item.get("Authors"))
        .iter()
        .map(|author| Author {
            name: text_at(author, "Name").unwrap_or_default(),
            isni: text_at(author, "ISNI"),
            orcid: text_at(author, "ORCID"),
        })
        .collect();
    (!authors.is_empty()).then_some(authors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::IdentifierKind;
    use crate::report::{CounterVersion, ReportType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn variant(report_type: ReportType) -> ReportVariant {
        ReportVariant::new(CounterVersion::V51, report_type)
    }

    #[test]
    fn test_database_report_item() {
        let item = json!({
            "Database": "Database 1",
            "Item_ID": {"Proprietary": "P1:DB1"},
            "Publisher": "Sample Publisher",
            "Platform": "Platform 1",
            "Attribute_Performance": [{
                "Data_Type": "Book",
                "Access_Method": "Regular",
                "Performance": {
                    "Total_Item_Investigations": {"2022-01": 1104, "2022-02": 17},
                    "Searches_Regular": {"2022-01": 5}
                }
            }]
        });
        let records = project_item(variant(ReportType::Dr), &item).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.title.as_deref(), Some("Database 1"));
        assert_eq!(first.title_ids.get(IdentifierKind::Proprietary), Some("P1:DB1"));
        assert_eq!(first.metric.as_deref(), Some("Total_Item_Investigations"));
        assert_eq!(first.value, 1104);
        assert_eq!(first.start, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
        assert_eq!(first.end, None);
        assert_eq!(first.dimension_data.len(), 4);
        assert_eq!(records[2].metric.as_deref(), Some("Searches_Regular"));
    }

    #[test]
    fn test_missing_attribute_performance() {
        let item = json!({"Title": "T", "Performance": {}});
        let err = project_item(variant(ReportType::Tr), &item).unwrap_err();
        assert_eq!(err.to_string(), "Missing 'Attribute_Performance' field");
    }

    #[test]
    fn test_attribute_performance_key_is_case_insensitive() {
        let item = json!({"Title": "T", "attribute_performance": []});
        assert!(project_item(variant(ReportType::Tr), &item).unwrap().is_empty());
    }

    #[test]
    fn test_extra_ids_in_attribute_performance() {
        let item = json!({
            "Platform": "P",
            "Attribute_Performance": [{"Item_ID": {"DOI": "10.1/x"}, "Performance": {}}]
        });
        let err = project_item(variant(ReportType::Pr), &item).unwrap_err();
        assert_eq!(err.to_string(), "Extra IDs not allowed {doi}");
    }

    fn item_report() -> Value {
        json!({
            "Title": "Title 1",
            "Item_ID": {"DOI": "10.9999/xxxxt01", "ISBN": "979-8-88888-888-8"},
            "Data_Type": "Book",
            "Platform": "Platform 1",
            "Publisher": "Sample Publisher",
            "Items": [{
                "Item": "Item 3",
                "Item_ID": {"DOI": "10.9999/xxxxi03", "Proprietary": "P1:I03"},
                "Publication_Date": "2022-07-24",
                "Authors": [{"Name": "Author 3"}],
                "Data_Type": "Book_Segment",
                "YOP": "2022",
                "Attribute_Performance": [{
                    "Access_Type": "Controlled",
                    "Access_Method": "Regular",
                    "Performance": {"Limit_Exceeded": {"2022-01": 49}}
                }]
            }]
        })
    }

    #[test]
    fn test_item_report_nesting() {
        let records = project_item(variant(ReportType::Ir), &item_report()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.title.as_deref(), Some("Title 1"));
        assert_eq!(record.title_ids.get(IdentifierKind::Isbn), Some("979-8-88888-888-8"));
        assert_eq!(record.item.as_deref(), Some("Item 3"));
        assert_eq!(record.item_ids.get(IdentifierKind::Proprietary), Some("P1:I03"));
        assert_eq!(record.item_publication_date.as_deref(), Some("2022-07-24"));
        assert_eq!(record.item_authors, Some(vec![Author::new("Author 3")]));
        assert_eq!(record.value, 49);
        assert_eq!(
            record.dimension_data.get("Data_Type").map(String::as_str),
            Some("Book_Segment")
        );
        assert_eq!(
            record.dimension_data.get("Parent_Data_Type").map(String::as_str),
            Some("Book")
        );
        assert_eq!(
            record.dimension_data.get("Publisher").map(String::as_str),
            Some("Sample Publisher")
        );
    }

    #[test]
    fn test_multimedia_report_keeps_no_parent_data_type() {
        let records = project_item(variant(ReportType::IrM1), &item_report()).unwrap();
        let dims = &records[0].dimension_data;
        assert!(!dims.contains_key("Parent_Data_Type"));
        assert_eq!(dims.get("Data_Type").map(String::as_str), Some("Book_Segment"));
    }

    #[test]
    fn test_invalid_month_key() {
        let item = json!({
            "Title": "T",
            "Attribute_Performance": [{"Performance": {"Total_Item_Requests": {"Jan 2022": 1}}}]
        });
        assert!(matches!(
            project_item(variant(ReportType::Tr), &item),
            Err(IngestError::Format { .. })
        ));
    }
}
