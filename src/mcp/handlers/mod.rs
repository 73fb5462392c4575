//! Tool handlers for the MCP server.
//!
//! Each handler takes the shared [`ReltioClient`](crate::reltio::ReltioClient) and the raw argument object and returns a
//! [`ToolOutcome`]. The server wraps every outcome into a `CallToolResult`, so failures never
//! cross the tool boundary as protocol errors.

use rmcp::model::{CallToolResult, JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::Config,
    error::{ErrorCode, ToolError},
    mcp::format::{error_result, json_result, yaml_result},
    normalize::is_present,
    reltio::ReltioError,
    validation::{TENANT_ID, ValidationError, min_len},
};

pub mod activity;
pub mod entity;
pub mod interaction;
pub mod lookup;
pub mod matching;
pub mod merge;
pub mod relation;
pub mod tenant_config;
pub mod user;
pub mod workflow;

/// Successful payload of a tool call.
#[derive(Debug)]
pub(crate) enum Output {
    /// Rendered as YAML text.
    Yaml(Value),
    /// Returned as structured JSON content.
    Json(Value),
}

impl Output {
    /// Payload regardless of rendering.
    #[cfg(test)]
    pub(crate) fn value(&self) -> &Value {
        match self {
            Self::Yaml(value) | Self::Json(value) => value,
        }
    }
}

/// Result of a tool body.
pub(crate) type ToolOutcome = Result<Output, ToolError>;

/// Per-operation argument check producing the normalized request.
pub(crate) trait Validate {
    /// Normalized request.
    type Output;

    /// Validate every field or reject the whole request.
    fn validate(self, config: &Config) -> Result<Self::Output, ValidationError>;
}

/// Deserialize the raw argument object and run its validation.
pub(crate) fn parse_request<T>(
    arguments: Option<JsonObject>,
    config: &Config,
) -> Result<T::Output, ToolError>
where
    T: DeserializeOwned + Validate,
{
    let raw: T = parse_arguments(arguments)?;
    Ok(raw.validate(config)?)
}

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, ToolError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value).map_err(|err| {
        ToolError::new(
            ErrorCode::ValidationError,
            format!("Invalid input: {err}"),
        )
    })
}

/// Resolve `tenant_id`, falling back to the configured tenant, and check its format.
pub(crate) fn tenant(config: &Config, raw: Option<String>) -> Result<String, ValidationError> {
    TENANT_ID.apply("tenant_id", &config.tenant_or_default(raw))
}

/// Convert a tool outcome into the MCP result sent to the host.
pub(crate) fn into_call_result(tool: &str, outcome: ToolOutcome) -> CallToolResult {
    match outcome {
        Ok(Output::Yaml(value)) => yaml_result(&value),
        Ok(Output::Json(value)) => json_result(value),
        Err(error) => {
            tracing::warn!(tool, code = %error.code, message = %error.message, "Tool call failed");
            error_result(&error)
        }
    }
}

/// Classify transport failures for a given action.
pub(crate) trait ReltioResultExt<T> {
    /// Map the error through [`ToolError::from_reltio`].
    fn or_tool_error(self, action: &str) -> Result<T, ToolError>;
}

impl<T> ReltioResultExt<T> for Result<T, ReltioError> {
    fn or_tool_error(self, action: &str) -> Result<T, ToolError> {
        self.map_err(|err| ToolError::from_reltio(err, action))
    }
}

/// Report a failed call as `API_REQUEST_ERROR`, keeping authentication and security codes.
///
/// `action` reads as an infinitive phrase, e.g. "retrieve workflow tasks".
pub(crate) fn request_failure(action: &'static str) -> impl FnOnce(ReltioError) -> ToolError {
    move |err| match err {
        ReltioError::Authentication(_) | ReltioError::Security(_) => {
            ToolError::from_reltio(err, action)
        }
        _ => ToolError::new(
            ErrorCode::ApiRequestError,
            format!("Failed to {action}: {err}"),
        ),
    }
}

/// Require at least one object in `items`, each carrying a non-empty `type`.
pub(crate) fn require_typed_objects(
    field: &'static str,
    items: &[Value],
) -> Result<(), ValidationError> {
    min_len(field, items, 1)?;
    for (index, item) in items.iter().enumerate() {
        let Some(item) = item.as_object() else {
            return Err(ValidationError::new(
                format!("{field}[{index}]"),
                "must be an object",
            ));
        };
        if !item.get("type").is_some_and(is_present) {
            return Err(ValidationError::new(
                format!("{field}[{index}].type"),
                "must have a non-empty type",
            ));
        }
    }
    Ok(())
}

/// `bool` rendered the way Reltio query strings expect.
pub(crate) fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use httpmock::MockServer;
    use rmcp::model::JsonObject;
    use serde_json::Value;

    use crate::{
        config::Config,
        reltio::{ReltioClient, StaticToken},
    };

    pub(crate) fn test_client(server: &MockServer) -> ReltioClient {
        ReltioClient::new(Arc::new(Config::for_base_url(&server.base_url(), "t1")))
            .expect("test client")
    }

    /// Client whose token source yields no credentials.
    pub(crate) fn tokenless_client(server: &MockServer) -> ReltioClient {
        ReltioClient::with_token_source(
            Arc::new(Config::for_base_url(&server.base_url(), "t1")),
            Arc::new(StaticToken(String::new())),
        )
        .expect("tokenless client")
    }

    /// Client pointed at a remote host over plain http.
    pub(crate) fn plain_http_client() -> ReltioClient {
        ReltioClient::new(Arc::new(Config::for_base_url(
            "http://tenant.reltio.example",
            "t1",
        )))
        .expect("plain http client")
    }

    pub(crate) fn arguments(value: Value) -> Option<JsonObject> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::arguments, *};

    #[test]
    fn unknown_fields_are_validation_errors() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        #[allow(dead_code)]
        struct Strict {
            entity_id: String,
        }
        let err = parse_arguments::<Strict>(arguments(serde_json::json!({"bogus": 1})))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn tenant_defaults_to_configured_value() {
        let config = Config::for_base_url("http://127.0.0.1:1", "t1");
        assert_eq!(tenant(&config, None).unwrap(), "t1");
        assert_eq!(tenant(&config, Some("  ".into())).unwrap(), "t1");
        assert_eq!(tenant(&config, Some("other".into())).unwrap(), "other");
        assert!(tenant(&config, Some("bad tenant".into())).is_err());
    }

    #[test]
    fn failures_become_error_results() {
        let result = into_call_result(
            "get_entity",
            Err(ToolError::new(ErrorCode::ServerError, "boom")),
        );
        assert_eq!(result.is_error, Some(true));
    }
}
