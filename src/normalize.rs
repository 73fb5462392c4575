//! Reshaping of Reltio API payloads into compact agent-facing structures.
//!
//! Reltio wraps every attribute value in metadata records
//! (`{"FirstName": [{"value": "John", "ov": true, "uri": ...}]}`); these helpers flatten that
//! convention, trim crosswalks to their identifying fields, and shape match listings.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder reported when the API omits a relevance score.
pub const RELEVANCE_NOT_AVAILABLE: &str = "not available";

/// Whether a value carries content: not null and not an empty string, list, or object.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Last `/`-separated segment of a URI-like string.
pub fn tail_segment(value: &str) -> &str {
    value.rsplit_once('/').map_or(value, |(_, tail)| tail)
}

/// Flatten a Reltio attribute bag.
///
/// Each attribute's `value` fields are extracted, nested attribute groups are flattened
/// recursively, empty extractions are dropped, single values collapse to scalars and
/// multi-valued attributes stay lists. Attributes with nothing left are omitted.
/// With `preserve_metadata` the input is returned unchanged.
pub fn simplify_attributes(attributes: &Value, preserve_metadata: bool) -> Value {
    if preserve_metadata {
        return attributes.clone();
    }
    let Some(map) = attributes.as_object() else {
        return Value::Object(Map::new());
    };
    Value::Object(simplify_map(map))
}

fn simplify_map(attributes: &Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();
    for (name, records) in attributes {
        let Some(records) = records.as_array() else {
            continue;
        };
        let mut values: Vec<Value> = records
            .iter()
            .filter_map(|record| record.as_object()?.get("value"))
            .map(|value| match value {
                Value::Object(nested) => Value::Object(simplify_map(nested)),
                other => other.clone(),
            })
            .filter(is_present)
            .collect();

        match values.len() {
            0 => {}
            1 => {
                result.insert(name.clone(), values.remove(0));
            }
            _ => {
                result.insert(name.clone(), Value::Array(values));
            }
        }
    }
    result
}

/// Reduce crosswalk records to `{id, type, value, createDate}`.
///
/// Non-object records are skipped. With `preserve_details` the object records are returned
/// unmodified.
pub fn slim_crosswalks(crosswalks: &Value, preserve_details: bool) -> Vec<Value> {
    let Some(records) = crosswalks.as_array() else {
        return Vec::new();
    };
    records
        .iter()
        .filter_map(Value::as_object)
        .map(|record| {
            if preserve_details {
                return Value::Object(record.clone());
            }
            let id = match record.get("uri").and_then(Value::as_str) {
                Some(uri) if uri.contains('/') => Value::String(tail_segment(uri).to_string()),
                _ => record.get("id").cloned().unwrap_or(Value::Null),
            };
            let kind = record
                .get("type")
                .and_then(Value::as_str)
                .map(|kind| Value::String(tail_segment(kind).to_string()))
                .unwrap_or_else(|| Value::String(String::new()));
            let create_date = ["createDate", "createTime", "createdTime"]
                .iter()
                .filter_map(|key| record.get(*key))
                .find(|value| is_present(value))
                .cloned()
                .unwrap_or(Value::Null);

            let mut slim = Map::new();
            slim.insert("id".into(), id);
            slim.insert("type".into(), kind);
            slim.insert(
                "value".into(),
                record.get("value").cloned().unwrap_or(Value::Null),
            );
            slim.insert("createDate".into(), create_date);
            Value::Object(slim)
        })
        .collect()
}

/// Keep only the requested top-level fields (and sub-fields of object fields) of an entity,
/// dropping empty values. `None` returns the entity unchanged; an empty sub-field list keeps
/// every non-empty entry of that field.
pub fn filter_entity(
    entity: &Map<String, Value>,
    filter_field: Option<&BTreeMap<String, Vec<String>>>,
) -> Map<String, Value> {
    let Some(filter_field) = filter_field else {
        return entity.clone();
    };

    let mut filtered = Map::new();
    for (field, subfields) in filter_field {
        let Some(value) = entity.get(field) else {
            continue;
        };
        if !is_present(value) {
            continue;
        }
        match value {
            Value::Object(inner) => {
                let kept: Map<String, Value> = inner
                    .iter()
                    .filter(|(key, sub)| {
                        (subfields.is_empty() || subfields.contains(key)) && is_present(sub)
                    })
                    .map(|(key, sub)| (key.clone(), sub.clone()))
                    .collect();
                if !kept.is_empty() {
                    filtered.insert(field.clone(), Value::Object(kept));
                }
            }
            other => {
                filtered.insert(field.clone(), other.clone());
            }
        }
    }
    filtered
}

/// Shape `_transitiveMatches` records into a map keyed by the matched entity URI.
///
/// When `enrichment` holds the full record of a matched entity, its simplified attributes and
/// slim crosswalks are attached.
pub fn format_entity_matches(
    matches: &[Value],
    enrichment: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut result = Map::new();
    for record in matches {
        let Some(uri) = record.pointer("/object/uri").and_then(Value::as_str) else {
            tracing::debug!("Skipping match record without object uri");
            continue;
        };
        let mut entry = Map::new();
        entry.insert(
            "label".into(),
            record.get("label").cloned().unwrap_or(Value::Null),
        );
        entry.insert(
            "matchRules".into(),
            record.get("matchRules").cloned().unwrap_or(Value::Null),
        );
        entry.insert(
            "relevance".into(),
            record
                .get("relevance")
                .cloned()
                .unwrap_or_else(|| Value::String(RELEVANCE_NOT_AVAILABLE.into())),
        );
        entry.insert(
            "createdTime".into(),
            record.get("createdTime").cloned().unwrap_or(Value::Null),
        );

        if let Some(entity) = enrichment.and_then(|entities| entities.get(uri)) {
            entry.insert(
                "attributes".into(),
                simplify_attributes(entity.get("attributes").unwrap_or(&Value::Null), false),
            );
            if let Some(crosswalks) = entity.get("crosswalks") {
                entry.insert(
                    "crosswalks".into(),
                    Value::Array(slim_crosswalks(crosswalks, false)),
                );
            }
        }
        result.insert(uri.to_string(), Value::Object(entry));
    }
    result
}

/// Compact entity summary used by graph and hierarchy responses.
pub fn summarize_graph_entity(entity: &Value) -> Value {
    let mut summary = Map::new();
    for (source, target) in [
        ("uri", "URI"),
        ("type", "type"),
        ("label", "label"),
        ("secondaryLabel", "secondaryLabel"),
        ("traversedRelations", "traversedRelationsCount"),
        ("untraversedRelations", "untraversedRelationsCount"),
    ] {
        if let Some(value) = entity.get(source).filter(|value| is_present(value)) {
            summary.insert(target.into(), value.clone());
        }
    }
    if let Some(attributes) = entity.get("attributes") {
        let simplified = simplify_attributes(attributes, false);
        if is_present(&simplified) {
            summary.insert("attributes".into(), simplified);
        }
    }
    if let Some(crosswalks) = entity.get("crosswalks") {
        let slim = slim_crosswalks(crosswalks, false);
        if !slim.is_empty() {
            summary.insert("crosswalks".into(), Value::Array(slim));
        }
    }
    Value::Object(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn single_value_collapses_to_scalar() {
        let out = simplify_attributes(&json!({"A": [{"value": "x"}]}), false);
        assert_eq!(out, json!({"A": "x"}));
    }

    #[test]
    fn multiple_values_stay_a_list() {
        let out = simplify_attributes(&json!({"A": [{"value": "x"}, {"value": "y"}]}), false);
        assert_eq!(out, json!({"A": ["x", "y"]}));
    }

    #[test]
    fn empty_nested_value_is_omitted() {
        let out = simplify_attributes(&json!({"A": [{"value": {}}]}), false);
        assert_eq!(out, json!({}));
    }

    #[test]
    fn nested_groups_flatten_recursively_in_order() {
        let input = json!({
            "Name": [{"value": "Acme", "ov": true}],
            "Address": [{
                "value": {
                    "City": [{"value": "Chicago"}],
                    "Zip": [{"value": "60601"}, {"value": "60602"}],
                    "Empty": [],
                    "Meta": [{"ov": false}]
                },
                "uri": "entities/1/attributes/Address/1"
            }],
            "Skipped": "not-a-list"
        });
        let out = simplify_attributes(&input, false);
        assert_eq!(
            out,
            json!({
                "Name": "Acme",
                "Address": {"City": "Chicago", "Zip": ["60601", "60602"]}
            })
        );
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["Name", "Address"]);
    }

    #[test]
    fn preserve_metadata_bypasses_simplification() {
        let input = json!({"A": [{"value": "x", "ov": true}]});
        assert_eq!(simplify_attributes(&input, true), input);
    }

    #[test]
    fn crosswalk_slimming_matches_expected_shape() {
        let input = json!([{
            "uri": "entities/e1/crosswalks/c1",
            "type": "configuration/sources/CRM",
            "value": "V1",
            "createDate": "2024-01-01",
            "attributes": ["entities/e1/attributes/Name/1"]
        }]);
        let out = slim_crosswalks(&input, false);
        assert_eq!(
            out,
            vec![json!({"id": "c1", "type": "CRM", "value": "V1", "createDate": "2024-01-01"})]
        );
    }

    #[test]
    fn crosswalk_slimming_falls_back_and_skips_non_objects() {
        let input = json!([
            "garbage",
            {"id": "raw", "type": "Reltio", "value": 7, "createdTime": 1700},
        ]);
        let out = slim_crosswalks(&input, false);
        assert_eq!(
            out,
            vec![json!({"id": "raw", "type": "Reltio", "value": 7, "createDate": 1700})]
        );
        assert_eq!(slim_crosswalks(&input, true).len(), 1);
    }

    #[test]
    fn filter_entity_selects_fields_and_subfields() {
        let entity = json!({
            "uri": "entities/1",
            "label": "",
            "attributes": {"FirstName": [{"value": "J"}], "LastName": [], "Email": [{"value": "e"}]},
            "crosswalks": [{"type": "x"}]
        });
        let entity = entity.as_object().unwrap();

        let mut filter = BTreeMap::new();
        filter.insert("attributes".to_string(), vec!["FirstName".to_string(), "LastName".to_string()]);
        filter.insert("label".to_string(), vec![]);
        filter.insert("missing".to_string(), vec![]);
        let out = filter_entity(entity, Some(&filter));
        assert_eq!(
            Value::Object(out),
            json!({"attributes": {"FirstName": [{"value": "J"}]}})
        );

        let mut all_attrs = BTreeMap::new();
        all_attrs.insert("attributes".to_string(), vec![]);
        let out = filter_entity(entity, Some(&all_attrs));
        assert_eq!(out["attributes"].as_object().unwrap().len(), 2);

        assert_eq!(filter_entity(entity, None), *entity);
    }

    #[test]
    fn matches_are_keyed_by_uri_and_enriched() {
        let matches = vec![
            json!({
                "object": {"uri": "entities/m1"},
                "matchRules": ["configuration/entityTypes/Individual/matchGroups/Rule1"],
                "createdTime": 1,
                "label": "Jane"
            }),
            json!({"matchRules": []}),
        ];
        let mut enrichment = Map::new();
        enrichment.insert(
            "entities/m1".into(),
            json!({"attributes": {"FirstName": [{"value": "Jane"}]}, "crosswalks": []}),
        );
        let out = format_entity_matches(&matches, Some(&enrichment));
        assert_eq!(out.len(), 1);
        let entry = &out["entities/m1"];
        assert_eq!(entry["relevance"], RELEVANCE_NOT_AVAILABLE);
        assert_eq!(entry["attributes"], json!({"FirstName": "Jane"}));
        assert_eq!(entry["crosswalks"], json!([]));
    }

    #[test]
    fn graph_entity_summary_renames_fields() {
        let entity = json!({
            "uri": "entities/1",
            "type": "configuration/entityTypes/HCO",
            "label": "Clinic",
            "traversedRelations": 2,
            "attributes": {"Name": [{"value": "Clinic"}]}
        });
        let summary = summarize_graph_entity(&entity);
        assert_eq!(summary["URI"], "entities/1");
        assert_eq!(summary["traversedRelationsCount"], 2);
        assert_eq!(summary["attributes"], json!({"Name": "Clinic"}));
        assert!(summary.get("crosswalks").is_none());
    }
}
