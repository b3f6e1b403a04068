//! Identity records tracked by the session registry

use serde::{Deserialize, Serialize};

/// Normalise an email address into a registry key
pub fn identity_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account cached against the identity that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl AccountSummary {
    pub fn new(id: i64, account_type: impl Into<String>) -> Self {
        Self {
            id,
            account_type: account_type.into(),
            currency: None,
        }
    }

    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Tokens handed out by a login or refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl IssuedTokens {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub const fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Absolute expiry in epoch milliseconds, relative to `now_ms`
    pub fn expires_at(&self, now_ms: i64) -> Option<i64> {
        self.expires_in.map(|seconds| {
            let lifetime = i64::try_from(seconds)
                .unwrap_or(i64::MAX)
                .saturating_mul(1_000);
            now_ms.saturating_add(lifetime)
        })
    }
}

/// One logged-in operator session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub key: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// Access token expiry in epoch milliseconds
    pub expires_at: Option<i64>,
    pub device_id: String,
    /// Time of the last token rotation in epoch milliseconds
    pub last_refresh_at: Option<i64>,
    pub accounts: Vec<AccountSummary>,
}

impl Identity {
    /// Milliseconds left before the access token expires
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        self.expires_at.map(|expires_at| expires_at - now_ms)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_ms(now_ms).is_some_and(|remaining| remaining <= 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_case_and_whitespace() {
        assert_eq!(identity_key("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn expiry_is_relative_to_issue_time() {
        let tokens = IssuedTokens::new("a").with_expires_in(200);
        assert_eq!(tokens.expires_at(10_000), Some(210_000));
        assert_eq!(IssuedTokens::new("a").expires_at(10_000), None);
    }
}
