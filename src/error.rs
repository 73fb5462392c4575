//! Error taxonomy returned across the tool boundary.
//!
//! Tool failures are values, not protocol errors: every handler converts its failure into an
//! [`ErrorEnvelope`] of the shape `{"error": {"code_key": ..., "message": ...}}`.

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::{reltio::ReltioError, validation::ValidationError};

/// Fixed set of `code_key` values exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Arguments failed validation before any network call.
    ValidationError,
    /// Credentials could not be obtained or were rejected (401).
    AuthenticationError,
    /// The caller is not allowed to perform the operation (403).
    AuthorizationError,
    /// The outbound connection failed the security pre-flight.
    SecurityError,
    /// The addressed object does not exist (404).
    ResourceNotFound,
    /// The API rejected the request payload (400).
    InvalidRequest,
    /// The API rejected the request parameters (400, parameter-centric call sites).
    BadRequest,
    /// The write conflicts with existing state (409).
    Conflict,
    /// The API answered with a body of an unexpected shape.
    UnexpectedResponse,
    /// Any other upstream failure.
    ServerError,
    /// The HTTP exchange itself failed.
    ApiRequestError,
    /// A failure inside this server.
    InternalServerError,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::AuthorizationError => "AUTHORIZATION_ERROR",
            Self::SecurityError => "SECURITY_ERROR",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::BadRequest => "BAD_REQUEST",
            Self::Conflict => "CONFLICT",
            Self::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            Self::ServerError => "SERVER_ERROR",
            Self::ApiRequestError => "API_REQUEST_ERROR",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform failure shape returned by every tool.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    /// Failure details.
    pub error: ErrorBody,
}

/// Body of an [`ErrorEnvelope`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Taxonomy key.
    pub code_key: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
}

/// Failure produced inside a tool function.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    /// Taxonomy key.
    pub code: ErrorCode,
    /// Human-readable explanation.
    pub message: String,
}

impl ToolError {
    /// Build a tool error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Convert into the serializable envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorBody {
                code_key: self.code,
                message: self.message.clone(),
            },
        }
    }

    /// Classify a transport failure for the operation described by `action`.
    ///
    /// `action` reads as a gerund phrase, e.g. "retrieving entity details".
    pub fn from_reltio(err: ReltioError, action: &str) -> Self {
        match &err {
            ReltioError::Authentication(detail) => {
                tracing::warn!(%detail, action, "Authentication failed");
                Self::new(
                    ErrorCode::AuthenticationError,
                    "Failed to authenticate with Reltio API",
                )
            }
            ReltioError::Security(detail) => Self::new(
                ErrorCode::SecurityError,
                format!("Connection security check failed: {detail}"),
            ),
            ReltioError::UnexpectedStatus { status, .. } => {
                let code = classify_status(*status);
                let detail = err
                    .api_error_message()
                    .map(|message| format!(": {message}"))
                    .unwrap_or_default();
                let message = match code {
                    ErrorCode::ResourceNotFound => {
                        format!("Resource not found while {action}{detail}")
                    }
                    ErrorCode::InvalidRequest => format!("Invalid request while {action}{detail}"),
                    ErrorCode::AuthenticationError => {
                        format!("Authentication rejected while {action}{detail}")
                    }
                    ErrorCode::AuthorizationError => {
                        format!("Permission denied while {action}{detail}")
                    }
                    ErrorCode::Conflict => format!("Conflict while {action}{detail}"),
                    _ => format!("Reltio API error ({status}) while {action}{detail}"),
                };
                Self::new(code, message)
            }
            ReltioError::InvalidResponse(detail) => Self::new(
                ErrorCode::UnexpectedResponse,
                format!("Unexpected response while {action}: {detail}"),
            ),
            ReltioError::InvalidUrl(_) | ReltioError::Http(_) => {
                tracing::error!(error = %err, action, "Reltio request failed");
                Self::new(
                    ErrorCode::ServerError,
                    format!("An error occurred while {action}"),
                )
            }
        }
    }
}

impl ToolError {
    /// Replace the message of a `RESOURCE_NOT_FOUND` error with a caller-specific one.
    pub fn when_not_found(self, message: impl FnOnce() -> String) -> Self {
        if self.code == ErrorCode::ResourceNotFound {
            Self::new(self.code, message())
        } else {
            self
        }
    }

    /// Swap the code `from` for `to`, leaving other codes untouched.
    pub fn reclassify(mut self, from: ErrorCode, to: ErrorCode) -> Self {
        if self.code == from {
            self.code = to;
        }
        self
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        Self::new(ErrorCode::ValidationError, format!("Invalid input: {err}"))
    }
}

/// Map an HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode) -> ErrorCode {
    match status.as_u16() {
        400 => ErrorCode::InvalidRequest,
        401 => ErrorCode::AuthenticationError,
        403 => ErrorCode::AuthorizationError,
        404 => ErrorCode::ResourceNotFound,
        409 => ErrorCode::Conflict,
        _ => ErrorCode::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(code: u16, body: &str) -> ReltioError {
        ReltioError::UnexpectedStatus {
            status: StatusCode::from_u16(code).expect("valid status"),
            body: body.to_string(),
        }
    }

    #[test]
    fn statuses_map_to_taxonomy() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ErrorCode::ResourceNotFound);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), ErrorCode::InvalidRequest);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ErrorCode::AuthenticationError);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ErrorCode::AuthorizationError);
        assert_eq!(classify_status(StatusCode::CONFLICT), ErrorCode::Conflict);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), ErrorCode::ServerError);
        assert_eq!(classify_status(StatusCode::IM_A_TEAPOT), ErrorCode::ServerError);
    }

    #[test]
    fn api_error_message_is_surfaced() {
        let err = ToolError::from_reltio(
            status_error(404, r#"{"errorMessage":"Entity not found","errorCode":100}"#),
            "retrieving entity details",
        );
        assert_eq!(err.code, ErrorCode::ResourceNotFound);
        assert!(err.message.contains("Entity not found"));
    }

    #[test]
    fn not_found_message_can_be_specialized() {
        let err = ToolError::from_reltio(status_error(404, ""), "retrieving entity details")
            .when_not_found(|| "Entity with ID abc not found".into());
        assert_eq!(err.message, "Entity with ID abc not found");

        let err = ToolError::from_reltio(status_error(500, ""), "retrieving entity details")
            .when_not_found(|| "unused".into());
        assert_eq!(err.code, ErrorCode::ServerError);
    }

    #[test]
    fn envelope_serializes_code_key() {
        let envelope = ToolError::new(ErrorCode::ValidationError, "bad").envelope();
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["error"]["code_key"], "VALIDATION_ERROR");
        assert_eq!(value["error"]["message"], "bad");
    }
}
