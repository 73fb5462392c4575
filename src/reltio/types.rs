//! Shared types used by the Reltio client.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors returned while talking to Reltio.
#[derive(Debug, Error)]
pub enum ReltioError {
    /// A base URL or endpoint failed to parse.
    #[error("Invalid Reltio URL: {0}")]
    InvalidUrl(String),
    /// No usable access token could be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// The outbound request failed the connection-security pre-flight.
    #[error("Insecure connection rejected: {0}")]
    Security(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Reltio responded with a non-success status code.
    #[error("Unexpected Reltio response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by Reltio.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A success response could not be decoded as JSON.
    #[error("Invalid response body: {0}")]
    InvalidResponse(String),
}

impl ReltioError {
    /// HTTP status carried by the error, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn error_body(&self) -> Option<ApiErrorBody> {
        match self {
            Self::UnexpectedStatus { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// `errorMessage` from a JSON error body.
    pub fn api_error_message(&self) -> Option<String> {
        self.error_body()?.error_message
    }

    /// Numeric `errorCode` from a JSON error body.
    pub fn api_error_code(&self) -> Option<i64> {
        self.error_body()?.error_code.and_then(|code| match code {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_code: Option<Value>,
}

/// OAuth token endpoint response.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_fields_are_extracted() {
        let err = ReltioError::UnexpectedStatus {
            status: StatusCode::NOT_FOUND,
            body: r#"{"errorMessage":"Parent not found","errorCode":"119"}"#.into(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.api_error_message().as_deref(), Some("Parent not found"));
        assert_eq!(err.api_error_code(), Some(119));
    }

    #[test]
    fn non_json_body_has_no_details() {
        let err = ReltioError::UnexpectedStatus {
            status: StatusCode::BAD_GATEWAY,
            body: "<html>".into(),
        };
        assert!(err.api_error_message().is_none());
        assert!(err.api_error_code().is_none());
    }
}
