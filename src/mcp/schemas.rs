//! JSON schema builders for MCP tools.

use schemars::JsonSchema;
use serde_json::{Map, Value};

/// Derive the input schema of a tool from its argument struct.
///
/// Field doc comments become property descriptions; the `$schema` and `title` keywords are
/// dropped because MCP hosts render the tool title separately.
pub(crate) fn input_schema<T: JsonSchema>() -> Map<String, Value> {
    let root = schemars::schema_for!(T);
    match serde_json::to_value(root) {
        Ok(Value::Object(mut schema)) => {
            schema.remove("$schema");
            schema.remove("title");
            schema.remove("description");
            schema
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            schema.insert("additionalProperties".into(), Value::Bool(false));
            schema
        }
        Ok(_) | Err(_) => {
            tracing::warn!(
                type_name = std::any::type_name::<T>(),
                "Falling back to an empty input schema"
            );
            empty_object_schema()
        }
    }
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
