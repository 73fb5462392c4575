//! Access-token acquisition and connection-security checks.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio::sync::Mutex;

use super::types::{ReltioError, TokenResponse};

const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of bearer tokens for outbound requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    /// Return a token valid for at least the next request.
    async fn access_token(&self, http: &Client) -> Result<String, ReltioError>;
}

/// Pre-issued token used verbatim.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self, _http: &Client) -> Result<String, ReltioError> {
        if self.0.trim().is_empty() {
            return Err(ReltioError::Authentication("empty access token".into()));
        }
        Ok(self.0.clone())
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// OAuth client-credentials exchange with an in-memory token cache.
pub struct ClientCredentialsSource {
    token_url: String,
    client_id: String,
    client_secret: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsSource {
    /// Create a source exchanging credentials at `{auth_base}/oauth/token`.
    pub fn new(auth_base: &str, client_id: String, client_secret: String) -> Self {
        Self {
            token_url: format!("{}/oauth/token", auth_base.trim_end_matches('/')),
            client_id,
            client_secret,
            cache: Mutex::new(None),
        }
    }

    async fn fetch(&self, http: &Client) -> Result<CachedToken, ReltioError> {
        let response = http
            .post(&self.token_url)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .map_err(|err| ReltioError::Authentication(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Token request rejected");
            return Err(ReltioError::Authentication(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| ReltioError::Authentication(format!("malformed token: {err}")))?;
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        tracing::debug!(expires_in = lifetime.as_secs(), "Obtained Reltio access token");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ClientCredentialsSource {
    async fn access_token(&self, http: &Client) -> Result<String, ReltioError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value.clone());
            }
        }
        let fresh = self.fetch(http).await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }
}

/// Reject requests that would leave over plain HTTP or without credentials.
///
/// Plain `http` is tolerated for loopback hosts only.
pub fn validate_connection_security(url: &str, has_authorization: bool) -> Result<(), ReltioError> {
    let parsed = Url::parse(url).map_err(|err| ReltioError::InvalidUrl(format!("{url}: {err}")))?;
    match parsed.scheme() {
        "https" => {}
        "http" if is_loopback(&parsed) => {}
        scheme => {
            return Err(ReltioError::Security(format!(
                "{scheme} connections are not allowed for {}",
                parsed.host_str().unwrap_or_default()
            )));
        }
    }
    if !has_authorization {
        return Err(ReltioError::Security(
            "missing Authorization header".into(),
        ));
    }
    Ok(())
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
    )
}
