//! Banking API gateway client
//!
//! Every request is a single best-effort attempt: no retries, no backoff.
//! Success yields the parsed [`Payload`]; any non-2xx status becomes
//! [`ClientError::Api`] carrying the method, path, status and raw body.

pub mod auth;
pub mod banking;
pub mod error;
pub mod payload;
pub mod typed;

pub use error::ClientError;
pub use payload::Payload;
pub use typed::Authorized;

use reqwest::{Client, ClientBuilder, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the caller's device identifier on auth endpoints
pub const DEVICE_ID_HEADER: &str = "X-Device-Id";

const DEFAULT_USER_AGENT: &str = concat!("teller/", env!("CARGO_PKG_VERSION"));

/// Banking API client
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Scope the client to a bearer token
    pub const fn with_bearer<'a>(&'a self, token: &'a str) -> Authorized<'a> {
        Authorized::new(self, token)
    }

    /// Issue one request and normalise the outcome
    ///
    /// `body` is sent as JSON when present. The `Content-Type` header is
    /// always `application/json`; `Authorization` is only set when `bearer`
    /// is given.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
        extra_headers: &[(&str, &str)],
    ) -> Result<Payload, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");

        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        debug!(%method, path, "Sending request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(%method, path, status = status.as_u16(), "Request rejected");
            return Err(ClientError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(%method, path, status = status.as_u16(), "Request succeeded");
        Ok(Payload::from_body(text))
    }

    /// Issue one request and deserialize the JSON response
    pub(crate) async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
        extra_headers: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        self.call(method, path, body, bearer, extra_headers)
            .await?
            .decode()
    }
}

/// Serialize a request body into the JSON value [`ApiClient::call`] sends
pub(crate) fn json_body<T: Serialize>(body: &T) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(body)?)
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set a request timeout; requests never time out by default
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Paths are appended verbatim, so drop any trailing slash
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must use http or https, got {}",
                parsed.scheme()
            )));
        }

        let mut client_builder = ClientBuilder::new()
            .user_agent(self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(ApiClient { client, base_url })
    }
}
