//! HTTP client wrapper for the Reltio REST APIs.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, header::CONTENT_TYPE};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{Config, Credentials};

use super::{
    auth::{AccessTokenSource, ClientCredentialsSource, StaticToken, validate_connection_security},
    types::ReltioError,
};

/// Lightweight HTTP client for Reltio operations.
pub struct ReltioClient {
    pub(crate) http: Client,
    config: Arc<Config>,
    tokens: Arc<dyn AccessTokenSource>,
}

impl ReltioClient {
    /// Construct a client whose token source follows the configured credentials.
    pub fn new(config: Arc<Config>) -> Result<Self, ReltioError> {
        let tokens: Arc<dyn AccessTokenSource> = match &config.credentials {
            Credentials::StaticToken(token) => Arc::new(StaticToken(token.clone())),
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => Arc::new(ClientCredentialsSource::new(
                &auth_base(&config),
                client_id.clone(),
                client_secret.clone(),
            )),
        };
        Self::with_token_source(config, tokens)
    }

    /// Construct a client with an explicit token source.
    pub fn with_token_source(
        config: Arc<Config>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Result<Self, ReltioError> {
        let http = Client::builder()
            .user_agent(concat!("reltio-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let api_base = api_base(&config);
        normalize_base_url(&api_base).map_err(ReltioError::InvalidUrl)?;
        tracing::debug!(
            api = %api_base,
            workflow = %workflow_base(&config),
            tenant = %config.default_tenant,
            "Initialized Reltio HTTP client"
        );

        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    /// Configuration shared with the handlers.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `{api}/reltio/api/{tenant}/{path}`.
    pub fn api_url(&self, tenant: &str, path: &str) -> String {
        format_endpoint(
            &format!("{}/reltio/api/{tenant}", api_base(&self.config)),
            path,
        )
    }

    /// `{api}/reltio/permissions/{tenant}`.
    pub fn permissions_url(&self, tenant: &str) -> String {
        format!("{}/reltio/permissions/{tenant}", api_base(&self.config))
    }

    /// `{api}/jobs/export/{tenant}/{path}`.
    pub fn export_url(&self, tenant: &str, path: &str) -> String {
        format_endpoint(
            &format!("{}/jobs/export/{tenant}", api_base(&self.config)),
            path,
        )
    }

    /// `{workflow}/services/workflow/{tenant}/{path}`.
    pub fn workflow_url(&self, tenant: &str, path: &str) -> String {
        format_endpoint(
            &format!(
                "{}/services/workflow/{tenant}",
                workflow_base(&self.config)
            ),
            path,
        )
    }

    /// `{api}/nui/workflow/workflow/{tenant}/{path}`.
    pub fn process_url(&self, tenant: &str, path: &str) -> String {
        format_endpoint(
            &format!("{}/nui/workflow/workflow/{tenant}", api_base(&self.config)),
            path,
        )
    }

    /// `{auth}/{path}`.
    pub fn auth_url(&self, path: &str) -> String {
        format_endpoint(&auth_base(&self.config), path)
    }

    /// Environment URL announced to the workflow service.
    pub fn environment_url(&self) -> String {
        api_base(&self.config)
    }

    /// Start a GET call.
    pub fn get(&self, url: String) -> ApiCall<'_> {
        ApiCall::new(self, Method::GET, url)
    }

    /// Start a POST call.
    pub fn post(&self, url: String) -> ApiCall<'_> {
        ApiCall::new(self, Method::POST, url)
    }

    /// Start a PUT call.
    pub fn put(&self, url: String) -> ApiCall<'_> {
        ApiCall::new(self, Method::PUT, url)
    }

    /// Start a DELETE call.
    pub fn delete(&self, url: String) -> ApiCall<'_> {
        ApiCall::new(self, Method::DELETE, url)
    }
}

/// A single outbound request under construction.
#[must_use = "an ApiCall does nothing until `send` is awaited"]
pub struct ApiCall<'a> {
    client: &'a ReltioClient,
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(&'static str, String)>,
    body: Option<Value>,
}

impl<'a> ApiCall<'a> {
    fn new(client: &'a ReltioClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present.
    pub fn query_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Append a query parameter unless the value is blank.
    pub fn query_non_empty(self, key: &str, value: &str) -> Self {
        if value.trim().is_empty() {
            self
        } else {
            self.query(key, value)
        }
    }

    /// Attach an extra header.
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Attach a fresh `Globalid` correlation header, required on write calls.
    pub fn global_id(self) -> Self {
        self.header("Globalid", Uuid::new_v4().to_string())
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Authenticate, run the security pre-flight, send, and decode the JSON response.
    ///
    /// An empty success body decodes to `Value::Null`.
    pub async fn send(self) -> Result<Value, ReltioError> {
        let token = self.client.tokens.access_token(&self.client.http).await?;
        validate_connection_security(&self.url, !token.is_empty())?;

        let mut request = self
            .client
            .http
            .request(self.method.clone(), &self.url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "application/json");
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        tracing::debug!(method = %self.method, url = %self.url, "Calling Reltio");
        let response = ensure_success(request.send().await?).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| ReltioError::InvalidResponse(err.to_string()))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ReltioError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = ReltioError::UnexpectedStatus { status, body };
        tracing::error!(error = %error, "Reltio request failed");
        Err(error)
    }
}

fn api_base(config: &Config) -> String {
    config
        .api_url
        .clone()
        .unwrap_or_else(|| format!("https://{}.reltio.com", config.environment))
        .trim_end_matches('/')
        .to_string()
}

fn workflow_base(config: &Config) -> String {
    config
        .workflow_url
        .clone()
        .unwrap_or_else(|| format!("https://{}-workflowui.reltio.com", config.environment))
        .trim_end_matches('/')
        .to_string()
}

fn auth_base(config: &Config) -> String {
    config
        .auth_url
        .clone()
        .unwrap_or_else(|| format!("https://{}", config.auth_server))
        .trim_end_matches('/')
        .to_string()
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn production_config() -> Config {
        let mut config = Config::for_base_url("http://127.0.0.1:1", "tenant1");
        config.environment = "dev".into();
        config.api_url = None;
        config.workflow_url = None;
        config.auth_url = None;
        config
    }

    #[test]
    fn urls_follow_reltio_hosts() {
        let client = ReltioClient::new(Arc::new(production_config())).expect("client");
        assert_eq!(
            client.api_url("tenant1", "entities/abc"),
            "https://dev.reltio.com/reltio/api/tenant1/entities/abc"
        );
        assert_eq!(
            client.export_url("tenant1", "entities/_crosswalksTree"),
            "https://dev.reltio.com/jobs/export/tenant1/entities/_crosswalksTree"
        );
        assert_eq!(
            client.workflow_url("tenant1", "tasks"),
            "https://dev-workflowui.reltio.com/services/workflow/tenant1/tasks"
        );
        assert_eq!(
            client.process_url("tenant1", "processInstances"),
            "https://dev.reltio.com/nui/workflow/workflow/tenant1/processInstances"
        );
        assert_eq!(
            client.auth_url("oauth/users/tenant/tenant1"),
            "https://auth.reltio.com/oauth/users/tenant/tenant1"
        );
    }

    #[tokio::test]
    async fn send_attaches_token_and_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/reltio/api/t1/entities/_search")
                    .query_param("max", "5")
                    .header("authorization", "Bearer test-token")
                    .header_exists("globalid")
                    .json_body(json!({"filter": "equals(type,'x')"}));
                then.status(200).json_body(json!([{"uri": "entities/1"}]));
            })
            .await;

        let client =
            ReltioClient::new(Arc::new(Config::for_base_url(&server.base_url(), "t1"))).unwrap();
        let value = client
            .post(client.api_url("t1", "entities/_search"))
            .query("max", 5)
            .global_id()
            .json(json!({"filter": "equals(type,'x')"}))
            .send()
            .await
            .expect("search call");

        mock.assert();
        assert_eq!(value[0]["uri"], "entities/1");
    }

    #[tokio::test]
    async fn non_success_status_is_structured() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/reltio/api/t1/entities/missing");
                then.status(404)
                    .json_body(json!({"errorMessage": "not here", "errorCode": 100}));
            })
            .await;

        let client =
            ReltioClient::new(Arc::new(Config::for_base_url(&server.base_url(), "t1"))).unwrap();
        let err = client
            .get(client.api_url("t1", "entities/missing"))
            .send()
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
        assert_eq!(err.api_error_message().as_deref(), Some("not here"));
    }

    #[tokio::test]
    async fn empty_body_decodes_to_null() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/reltio/api/t1/entities/a/_notMatch");
                then.status(200).body("");
            })
            .await;

        let client =
            ReltioClient::new(Arc::new(Config::for_base_url(&server.base_url(), "t1"))).unwrap();
        let value = client
            .post(client.api_url("t1", "entities/a/_notMatch"))
            .send()
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn endpoint_formatting_handles_slashes() {
        assert_eq!(format_endpoint("http://h/", "/a/b"), "http://h/a/b");
        assert_eq!(format_endpoint("http://h", ""), "http://h");
    }
}
