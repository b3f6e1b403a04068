//! Authentication API client methods

use super::{ApiClient, Authorized, ClientError, DEVICE_ID_HEADER, json_body};
use crate::types::{
    HealthResponse, LoginRequest, MeResponse, RefreshRequest, SignupRequest, SignupResponse,
    TokenResponse,
};
use reqwest::Method;

impl ApiClient {
    /// Register a user and its account holder
    pub async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse, ClientError> {
        let body = json_body(request)?;
        self.call_json(Method::POST, "/v1/auth/signup", Some(&body), None, &[])
            .await
    }

    /// Exchange credentials for a token pair
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<TokenResponse, ClientError> {
        let body = json_body(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.call_json(
            Method::POST,
            "/v1/auth/login",
            Some(&body),
            None,
            &[(DEVICE_ID_HEADER, device_id)],
        )
        .await
    }

    /// Rotate a refresh token into a new token pair
    pub async fn refresh(
        &self,
        refresh_token: &str,
        device_id: &str,
    ) -> Result<TokenResponse, ClientError> {
        let body = json_body(&RefreshRequest {
            refresh_token: refresh_token.to_string(),
        })?;
        self.call_json(
            Method::POST,
            "/v1/auth/refresh",
            Some(&body),
            None,
            &[(DEVICE_ID_HEADER, device_id)],
        )
        .await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.call_json(Method::GET, "/v1/health", None, None, &[])
            .await
    }
}

impl Authorized<'_> {
    /// User the bearer token belongs to
    pub async fn me(&self) -> Result<MeResponse, ClientError> {
        self.call_json(Method::GET, "/v1/auth/me", None).await
    }
}
