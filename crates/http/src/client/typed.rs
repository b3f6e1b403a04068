//! Bearer-scoped view of the client
//!
//! Endpoints that need a token are only reachable through [`Authorized`], so
//! calling one without credentials does not compile.

use super::{ApiClient, ClientError, Payload};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Client borrowed together with an access token
#[derive(Clone, Copy, Debug)]
pub struct Authorized<'a> {
    client: &'a ApiClient,
    token: &'a str,
}

impl<'a> Authorized<'a> {
    pub(crate) const fn new(client: &'a ApiClient, token: &'a str) -> Self {
        Self { client, token }
    }

    /// Access token sent as `Authorization: Bearer`
    pub const fn token(&self) -> &str {
        self.token
    }

    pub const fn client(&self) -> &ApiClient {
        self.client
    }

    /// Issue an authenticated request
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Payload, ClientError> {
        self.client
            .call(method, path, body, Some(self.token), &[])
            .await
    }

    pub(crate) async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        self.client
            .call_json(method, path, body, Some(self.token), &[])
            .await
    }
}
