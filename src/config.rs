use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Default OAuth and user-management host.
pub const DEFAULT_AUTH_SERVER: &str = "auth.reltio.com";
/// Default display name advertised to MCP hosts.
pub const DEFAULT_SERVER_NAME: &str = "reltio-mcp";
/// Default client type stamped on activity-log entries.
pub const DEFAULT_ACTIVITY_CLIENT: &str = "reltio-mcp-server";
/// Default ceiling for "configured limit" operations such as direct match lookups.
pub const DEFAULT_MAX_RESULTS_LIMIT: u32 = 100;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Credential material used to obtain API access.
#[derive(Clone, Deserialize)]
pub enum Credentials {
    /// OAuth client-credentials pair exchanged for a bearer token.
    ClientCredentials {
        /// OAuth client identifier.
        client_id: String,
        /// OAuth client secret.
        client_secret: String,
    },
    /// Pre-issued bearer token used as-is.
    StaticToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Self::StaticToken(_) => f.write_str("StaticToken(<redacted>)"),
        }
    }
}

/// Runtime configuration for the Reltio MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Tenant used whenever a tool call omits `tenant_id`.
    pub default_tenant: String,
    /// Environment prefix, e.g. `dev` for `https://dev.reltio.com`.
    pub environment: String,
    /// Host serving OAuth tokens and user management.
    pub auth_server: String,
    /// Display name reported in server info and capabilities.
    pub server_name: String,
    /// Credentials used by the token provider.
    pub credentials: Credentials,
    /// Client type recorded on activity-log entries.
    pub activity_client: String,
    /// Ceiling applied to operations bounded by the configured limit.
    pub max_results_limit: u32,
    /// Fixed timeout applied to every outbound request.
    pub http_timeout_secs: u64,
    /// Optional override of the API base URL (tenant path excluded).
    pub api_url: Option<String>,
    /// Optional override of the workflow service base URL.
    pub workflow_url: Option<String>,
    /// Optional override of the auth server base URL.
    pub auth_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = match load_env_optional("RELTIO_ACCESS_TOKEN") {
            Some(token) => Credentials::StaticToken(token),
            None => Credentials::ClientCredentials {
                client_id: load_env("RELTIO_CLIENT_ID")?,
                client_secret: load_env("RELTIO_CLIENT_SECRET")?,
            },
        };

        Ok(Self {
            default_tenant: load_env("RELTIO_TENANT")?,
            environment: load_env("RELTIO_ENVIRONMENT")?,
            auth_server: load_env_optional("RELTIO_AUTH_SERVER")
                .unwrap_or_else(|| DEFAULT_AUTH_SERVER.to_string()),
            server_name: load_env_optional("RELTIO_SERVER_NAME")
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
            credentials,
            activity_client: load_env_optional("RELTIO_ACTIVITY_CLIENT")
                .unwrap_or_else(|| DEFAULT_ACTIVITY_CLIENT.to_string()),
            max_results_limit: load_env_optional("RELTIO_MAX_RESULTS_LIMIT")
                .map(|value| {
                    value
                        .parse()
                        .ok()
                        .filter(|limit: &u32| *limit > 0)
                        .ok_or_else(|| ConfigError::InvalidValue("RELTIO_MAX_RESULTS_LIMIT".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_RESULTS_LIMIT),
            http_timeout_secs: load_env_optional("RELTIO_HTTP_TIMEOUT_SECS")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("RELTIO_HTTP_TIMEOUT_SECS".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            api_url: load_env_optional("RELTIO_API_URL"),
            workflow_url: load_env_optional("RELTIO_WORKFLOW_URL"),
            auth_url: load_env_optional("RELTIO_AUTH_URL"),
        })
    }

    /// Build a configuration pointing every endpoint at a single base URL.
    ///
    /// Used by tests and local mocks; the credentials are a static token.
    pub fn for_base_url(base_url: &str, tenant: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            default_tenant: tenant.to_string(),
            environment: "test".into(),
            auth_server: DEFAULT_AUTH_SERVER.into(),
            server_name: DEFAULT_SERVER_NAME.into(),
            credentials: Credentials::StaticToken("test-token".into()),
            activity_client: DEFAULT_ACTIVITY_CLIENT.into(),
            max_results_limit: DEFAULT_MAX_RESULTS_LIMIT,
            http_timeout_secs: 5,
            api_url: Some(base.clone()),
            workflow_url: Some(format!("{base}/workflow")),
            auth_url: Some(base),
        }
    }

    /// Resolve the tenant for a call, falling back to the configured default.
    pub fn tenant_or_default(&self, tenant: Option<String>) -> String {
        tenant
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.default_tenant.clone())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    tracing::debug!(
        tenant = %config.default_tenant,
        environment = %config.environment,
        auth_server = %config.auth_server,
        max_results_limit = config.max_results_limit,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_falls_back_to_default() {
        let config = Config::for_base_url("http://127.0.0.1:9/", "tenantA");
        assert_eq!(config.tenant_or_default(None), "tenantA");
        assert_eq!(config.tenant_or_default(Some("  ".into())), "tenantA");
        assert_eq!(config.tenant_or_default(Some("other".into())), "other");
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let config = Config::for_base_url("http://127.0.0.1:9/", "t");
        assert_eq!(config.api_url.as_deref(), Some("http://127.0.0.1:9"));
        assert_eq!(
            config.workflow_url.as_deref(),
            Some("http://127.0.0.1:9/workflow")
        );
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let creds = Credentials::ClientCredentials {
            client_id: "client".into(),
            client_secret: "hunter2".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("hunter2"));
    }
}
