//! Formatting helpers shared across MCP handlers and resources.

use rmcp::model::{CallToolResult, Content, ResourceContents};
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Render a payload as block-style YAML, keeping key insertion order.
///
/// Falls back to pretty JSON if the YAML emitter rejects the value.
pub(crate) fn to_yaml(value: &Value) -> String {
    serde_yaml::to_string(value).unwrap_or_else(|error| {
        tracing::warn!(%error, "Failed to render YAML; falling back to JSON");
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    })
}

/// Successful tool result carrying YAML text.
pub(crate) fn yaml_result(value: &Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(to_yaml(value))])
}

/// Successful tool result carrying a structured JSON document.
pub(crate) fn json_result(value: Value) -> CallToolResult {
    CallToolResult::structured(value)
}

/// Tool result carrying an error envelope.
pub(crate) fn error_result(error: &ToolError) -> CallToolResult {
    let envelope = serde_json::to_value(error.envelope()).unwrap_or_else(|_| {
        serde_json::json!({
            "error": { "code_key": error.code.as_str(), "message": error.message }
        })
    });
    CallToolResult::structured_error(envelope)
}

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}
