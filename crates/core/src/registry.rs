//! Session registry
//!
//! Tracks every identity that logged in during this process, the accounts
//! each one created, and which identity is currently active. Every mutation
//! publishes a [`RegistrySnapshot`] on a watch channel; views and the expiry
//! notifier react to that instead of being called directly.

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::identity::{AccountSummary, Identity, IssuedTokens, identity_key};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Active identity as seen by change subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveIdentity {
    pub key: String,
    pub email: String,
    pub expires_at: Option<i64>,
    pub accounts: usize,
}

impl From<&Identity> for ActiveIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            key: identity.key.clone(),
            email: identity.email.clone(),
            expires_at: identity.expires_at,
            accounts: identity.accounts.len(),
        }
    }
}

/// Registry state published after every mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Incremented on every mutation
    pub version: u64,
    pub identities: usize,
    pub active: Option<ActiveIdentity>,
}

/// Registry of logged-in identities
pub struct SessionRegistry {
    identities: BTreeMap<String, Identity>,
    active: Option<String>,
    clock: Arc<dyn Clock>,
    version: u64,
    changes: watch::Sender<RegistrySnapshot>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = watch::channel(RegistrySnapshot::default());
        Self {
            identities: BTreeMap::new(),
            active: None,
            clock,
            version: 0,
            changes,
        }
    }

    /// Insert a new identity or rotate the tokens of an existing one
    ///
    /// The identity becomes active. When `tokens` carries no refresh token the
    /// previously stored one is kept.
    pub fn upsert(&mut self, email: &str, tokens: IssuedTokens, device_id: &str) -> &Identity {
        let key = identity_key(email);
        let now = self.clock.now_ms();
        let expires_at = tokens.expires_at(now);

        match self.identities.get_mut(&key) {
            Some(identity) => {
                identity.access_token = tokens.access_token;
                if let Some(refresh_token) = tokens.refresh_token {
                    identity.refresh_token = Some(refresh_token);
                }
                identity.expires_at = expires_at;
                identity.device_id = device_id.to_string();
                identity.last_refresh_at = Some(now);
                info!(identity = %key, "Rotated session tokens");
            }
            None => {
                self.identities.insert(
                    key.clone(),
                    Identity {
                        key: key.clone(),
                        email: email.trim().to_string(),
                        access_token: tokens.access_token,
                        refresh_token: tokens.refresh_token,
                        expires_at,
                        device_id: device_id.to_string(),
                        last_refresh_at: None,
                        accounts: Vec::new(),
                    },
                );
                info!(identity = %key, "Registered new identity");
            }
        }

        self.active = Some(key.clone());
        self.publish();
        &self.identities[&key]
    }

    /// Switch the active identity
    ///
    /// An unknown key leaves no identity active.
    pub fn set_active(&mut self, key: &str) -> Option<&Identity> {
        let key = identity_key(key);
        if self.identities.contains_key(&key) {
            debug!(identity = %key, "Switched active identity");
            self.active = Some(key);
        } else {
            debug!(identity = %key, "Cleared active identity, key not registered");
            self.active = None;
        }
        self.publish();
        self.active()
    }

    /// Accounts cached for an identity, empty for unknown keys
    pub fn accounts_for(&self, key: &str) -> &[AccountSummary] {
        self.identities
            .get(&identity_key(key))
            .map(|identity| identity.accounts.as_slice())
            .unwrap_or_default()
    }

    /// Append a newly created account to an identity's cache
    ///
    /// Returns `false` when the key is not registered.
    pub fn record_account(&mut self, key: &str, account: AccountSummary) -> bool {
        let key = identity_key(key);
        let Some(identity) = self.identities.get_mut(&key) else {
            return false;
        };
        debug!(identity = %key, account_id = account.id, "Cached account");
        identity.accounts.push(account);
        self.publish();
        true
    }

    /// Currently active identity
    pub fn active(&self) -> Option<&Identity> {
        self.active
            .as_ref()
            .and_then(|key| self.identities.get(key))
    }

    /// Key of the currently active identity
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Active identity, or [`CoreError::NoActiveIdentity`]
    pub fn require_active(&self) -> CoreResult<&Identity> {
        self.active().ok_or(CoreError::NoActiveIdentity)
    }

    pub fn get(&self, key: &str) -> Option<&Identity> {
        self.identities.get(&identity_key(key))
    }

    /// Identity for `key`, or [`CoreError::UnknownIdentity`]
    pub fn require(&self, key: &str) -> CoreResult<&Identity> {
        self.get(key)
            .ok_or_else(|| CoreError::unknown_identity(identity_key(key)))
    }

    /// All identities ordered by key
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Subscribe to registry changes
    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.changes.subscribe()
    }

    /// Current state in its published form
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            version: self.version,
            identities: self.identities.len(),
            active: self.active().map(ActiveIdentity::from),
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        self.changes.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RuntimeClock;

    fn registry_at(epoch_ms: i64) -> SessionRegistry {
        SessionRegistry::new(Arc::new(RuntimeClock::starting_at(epoch_ms)))
    }

    fn tokens(access: &str, refresh: &str, expires_in: u64) -> IssuedTokens {
        IssuedTokens::new(access)
            .with_refresh_token(refresh)
            .with_expires_in(expires_in)
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_same_email_keeps_one_identity() {
        let mut registry = registry_at(0);

        registry.upsert("Ada@Example.com", tokens("a1", "r1", 600), "web");
        registry.upsert("ada@example.com", tokens("a2", "r2", 900), "web");
        registry.upsert(" ADA@EXAMPLE.COM", tokens("a3", "r3", 1200), "cli");

        assert_eq!(registry.len(), 1);
        let identity = registry.get("ada@example.com").unwrap();
        assert_eq!(identity.access_token, "a3");
        assert_eq!(identity.refresh_token.as_deref(), Some("r3"));
        assert_eq!(identity.expires_at, Some(1_200_000));
        assert_eq!(identity.device_id, "cli");
        assert_eq!(identity.email, "Ada@Example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_records_refresh_time() {
        let mut registry = registry_at(5_000);

        let created = registry.upsert("ada@example.com", tokens("a1", "r1", 60), "web");
        assert_eq!(created.last_refresh_at, None);

        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        let rotated = registry.upsert("ada@example.com", tokens("a2", "r2", 60), "web");
        assert_eq!(rotated.last_refresh_at, Some(35_000));
        assert_eq!(rotated.expires_at, Some(95_000));
    }

    #[tokio::test(start_paused = true)]
    async fn rotation_without_refresh_token_keeps_previous() {
        let mut registry = registry_at(0);

        registry.upsert("ada@example.com", tokens("a1", "r1", 60), "web");
        let rotated = registry.upsert(
            "ada@example.com",
            IssuedTokens::new("a2").with_expires_in(60),
            "web",
        );

        assert_eq!(rotated.access_token, "a2");
        assert_eq!(rotated.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_activates_identity() {
        let mut registry = registry_at(0);

        registry.upsert("ada@example.com", tokens("a", "r", 60), "web");
        registry.upsert("grace@example.com", tokens("g", "r", 60), "web");
        assert_eq!(registry.active_key(), Some("grace@example.com"));

        registry.upsert("ada@example.com", tokens("a2", "r", 60), "web");
        assert_eq!(registry.active_key(), Some("ada@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_key_clears_active() {
        let mut registry = registry_at(0);
        registry.upsert("ada@example.com", tokens("a", "r", 60), "web");

        assert!(registry.set_active("nobody@example.com").is_none());
        assert!(registry.active().is_none());
        assert_eq!(
            registry.require_active().unwrap_err(),
            CoreError::NoActiveIdentity
        );

        let active = registry.set_active("ADA@example.com").unwrap();
        assert_eq!(active.key, "ada@example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn account_cache_only_grows() {
        let mut registry = registry_at(0);
        registry.upsert("ada@example.com", tokens("a", "r", 60), "web");

        assert!(registry.accounts_for("ada@example.com").is_empty());
        assert!(registry.accounts_for("nobody@example.com").is_empty());

        assert!(registry.record_account("ada@example.com", AccountSummary::new(1, "checking")));
        assert!(registry.record_account("ada@example.com", AccountSummary::new(2, "savings")));
        assert!(!registry.record_account("nobody@example.com", AccountSummary::new(3, "savings")));

        // Token rotation leaves the cache alone
        registry.upsert("ada@example.com", tokens("a2", "r2", 60), "web");

        let ids: Vec<i64> = registry
            .accounts_for("ada@example.com")
            .iter()
            .map(|account| account.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_publish_snapshots() {
        let mut registry = registry_at(0);
        let mut changes = registry.subscribe();

        registry.upsert("ada@example.com", tokens("a", "r", 600), "web");
        assert!(changes.has_changed().unwrap());
        let snapshot = changes.borrow_and_update().clone();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.identities, 1);
        let active = snapshot.active.unwrap();
        assert_eq!(active.key, "ada@example.com");
        assert_eq!(active.expires_at, Some(600_000));

        registry.record_account("ada@example.com", AccountSummary::new(7, "checking"));
        let snapshot = changes.borrow_and_update().clone();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.active.unwrap().accounts, 1);

        registry.set_active("nobody@example.com");
        assert_eq!(changes.borrow_and_update().active, None);
    }
}
