//! Workbench: the context every front end drives
//!
//! Owns the API client, the session registry and the expiry notifier. The
//! notifier follows the registry on its own, so operations only need to keep
//! the registry current. Operations that need a bearer token fail with
//! [`CoreError::NoActiveIdentity`] before touching the network.

use crate::error::{WorkbenchError, WorkbenchResult};
use std::sync::Arc;
use std::time::Duration;
use teller_core::{
    Clock, CoreError, DEFAULT_PROMPT_WINDOW, ExpiryEvent, ExpiryNotifier, Identity,
    RefreshPrompt, ScheduledTask, SessionRegistry, SystemClock, Ticker, TokenStatus,
};
use teller_http::ApiClient;
use teller_http::types::{
    AccountCreate, AccountRead, AccountType, CardCreate, CardRead, CardType, HealthResponse,
    MeResponse, SignupRequest, SignupResponse, StatementResponse, TransactionCreate,
    TransactionRead, TransactionType, TransferCreate, TransferRead,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Workbench options
#[derive(Debug, Clone)]
pub struct WorkbenchConfig {
    /// Device id used when a login does not name one
    pub device_id: String,
    pub prompt_window: Duration,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            device_id: "demo-cli".to_string(),
            prompt_window: DEFAULT_PROMPT_WINDOW,
        }
    }
}

pub struct Workbench {
    client: ApiClient,
    registry: SessionRegistry,
    notifier: ExpiryNotifier,
    clock: Arc<dyn Clock>,
    device_id: String,
    _follower: ScheduledTask,
}

impl Workbench {
    /// Create a workbench on the system clock
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(client: ApiClient, prompt: Arc<dyn RefreshPrompt>, config: WorkbenchConfig) -> Self {
        Self::with_clock(client, prompt, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        client: ApiClient,
        prompt: Arc<dyn RefreshPrompt>,
        config: WorkbenchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = SessionRegistry::new(Arc::clone(&clock));
        let notifier = ExpiryNotifier::with_window(Arc::clone(&clock), prompt, config.prompt_window);
        let follower = notifier.follow(registry.subscribe());

        Self {
            client,
            registry,
            notifier,
            clock,
            device_id: config.device_id,
            _follower: follower,
        }
    }

    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub const fn notifier(&self) -> &ExpiryNotifier {
        &self.notifier
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Answered refresh prompts
    pub fn expiry_events(&self) -> broadcast::Receiver<ExpiryEvent> {
        self.notifier.subscribe()
    }

    /// Remaining lifetime of the active token right now
    pub fn token_status(&self) -> TokenStatus {
        TokenStatus::evaluate(self.registry.snapshot().active.as_ref(), self.clock.now_ms())
    }

    /// Start a readout that refreshes every `interval`
    pub fn ticker(&self, interval: Duration) -> Ticker {
        self.notifier.ticker(interval, self.registry.subscribe())
    }

    pub async fn signup(&self, request: &SignupRequest) -> WorkbenchResult<SignupResponse> {
        let result = self.client.signup(request).await.map_err(Into::into);
        if let Ok(response) = &result {
            info!(email = %response.user.email, user_id = response.user.id, "Signed up");
        }
        logged("signup", result)
    }

    /// Log in and make the identity active
    pub async fn login(
        &mut self,
        email: &str,
        password: &str,
        device_id: Option<&str>,
    ) -> WorkbenchResult<Identity> {
        let device_id = device_id.unwrap_or(&self.device_id).to_string();
        let result = match self.client.login(email, password, &device_id).await {
            Ok(tokens) => {
                let identity = self.registry.upsert(email, tokens.into(), &device_id).clone();
                info!(identity = %identity.key, expires_at = ?identity.expires_at, "Logged in");
                Ok(identity)
            }
            Err(e) => Err(e.into()),
        };
        logged("login", result)
    }

    /// Rotate the active identity's tokens
    ///
    /// A failed refresh leaves the stored tokens untouched.
    pub async fn refresh_active(&mut self) -> WorkbenchResult<Identity> {
        let result = self.try_refresh_active().await;
        logged("refresh", result)
    }

    async fn try_refresh_active(&mut self) -> WorkbenchResult<Identity> {
        let active = self.registry.require_active()?;
        let refresh_token = active
            .refresh_token
            .clone()
            .ok_or_else(|| WorkbenchError::MissingRefreshToken(active.key.clone()))?;
        let email = active.email.clone();
        let device_id = active.device_id.clone();

        let tokens = self.client.refresh(&refresh_token, &device_id).await?;
        let identity = self.registry.upsert(&email, tokens.into(), &device_id).clone();
        info!(identity = %identity.key, expires_at = ?identity.expires_at, "Refreshed session");
        Ok(identity)
    }

    /// Make a previously logged-in identity active
    ///
    /// An unknown email leaves no identity active.
    pub fn switch_to(&mut self, email: &str) -> WorkbenchResult<Identity> {
        let result = self
            .registry
            .set_active(email)
            .cloned()
            .ok_or_else(|| CoreError::unknown_identity(teller_core::identity_key(email)).into());
        if let Ok(identity) = &result {
            info!(identity = %identity.key, "Switched identity");
        }
        logged("switch", result)
    }

    /// Open an account and cache it against the active identity
    pub async fn create_account(
        &mut self,
        account_type: AccountType,
        currency: &str,
    ) -> WorkbenchResult<AccountRead> {
        let result = self.try_create_account(account_type, currency).await;
        logged("create_account", result)
    }

    async fn try_create_account(
        &mut self,
        account_type: AccountType,
        currency: &str,
    ) -> WorkbenchResult<AccountRead> {
        let (key, token) = self.bearer()?;
        let request = AccountCreate {
            account_type,
            currency: currency.to_string(),
        };
        let account = self.client.with_bearer(&token).create_account(&request).await?;
        self.registry.record_account(&key, (&account).into());
        info!(identity = %key, account_id = account.id, %account_type, "Created account");
        Ok(account)
    }

    /// Accounts the server lists for the active identity
    pub async fn list_accounts(&self) -> WorkbenchResult<Vec<AccountRead>> {
        let result = async {
            let (_, token) = self.bearer()?;
            Ok::<_, WorkbenchError>(self.client.with_bearer(&token).list_accounts().await?)
        }
        .await;
        logged("list_accounts", result)
    }

    pub async fn deposit(
        &self,
        account_id: i64,
        amount: i64,
        currency: &str,
    ) -> WorkbenchResult<TransactionRead> {
        self.transaction(TransactionType::Deposit, account_id, amount, currency)
            .await
    }

    pub async fn withdraw(
        &self,
        account_id: i64,
        amount: i64,
        currency: &str,
    ) -> WorkbenchResult<TransactionRead> {
        self.transaction(TransactionType::Withdrawal, account_id, amount, currency)
            .await
    }

    async fn transaction(
        &self,
        transaction_type: TransactionType,
        account_id: i64,
        amount: i64,
        currency: &str,
    ) -> WorkbenchResult<TransactionRead> {
        let result = async {
            let (_, token) = self.bearer()?;
            let request = TransactionCreate {
                account_id,
                transaction_type,
                amount,
                currency: currency.to_string(),
            };
            let transaction = self
                .client
                .with_bearer(&token)
                .create_transaction(&request)
                .await?;
            info!(account_id, amount, %transaction_type, transaction_id = transaction.id, "Posted transaction");
            Ok::<_, WorkbenchError>(transaction)
        }
        .await;
        logged(transaction_type.as_str(), result)
    }

    pub async fn transfer(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        amount: i64,
        currency: &str,
    ) -> WorkbenchResult<TransferRead> {
        let result = async {
            let (_, token) = self.bearer()?;
            let request = TransferCreate {
                from_account_id,
                to_account_id,
                amount,
                currency: currency.to_string(),
            };
            let transfer = self.client.with_bearer(&token).create_transfer(&request).await?;
            info!(from_account_id, to_account_id, amount, transfer_id = transfer.id, "Transferred funds");
            Ok::<_, WorkbenchError>(transfer)
        }
        .await;
        logged("transfer", result)
    }

    pub async fn statement(&self, account_id: i64) -> WorkbenchResult<StatementResponse> {
        let result = async {
            let (_, token) = self.bearer()?;
            let statement = self.client.with_bearer(&token).statement(account_id).await?;
            info!(account_id, balance = statement.balance, entries = statement.transactions.len(), "Fetched statement");
            Ok::<_, WorkbenchError>(statement)
        }
        .await;
        logged("statement", result)
    }

    /// Who the server thinks the active token belongs to
    pub async fn me(&self) -> WorkbenchResult<MeResponse> {
        let result = async {
            let (_, token) = self.bearer()?;
            Ok::<_, WorkbenchError>(self.client.with_bearer(&token).me().await?)
        }
        .await;
        logged("me", result)
    }

    /// Server health; needs no identity
    pub async fn health(&self) -> WorkbenchResult<HealthResponse> {
        let result = self.client.health().await.map_err(Into::into);
        if let Ok(health) = &result {
            info!(status = %health.status, "Health checked");
        }
        logged("health", result)
    }

    pub async fn issue_card(
        &self,
        account_id: i64,
        card_type: CardType,
    ) -> WorkbenchResult<CardRead> {
        let result = async {
            let (_, token) = self.bearer()?;
            let request = CardCreate {
                account_id,
                card_type,
            };
            let card = self.client.with_bearer(&token).create_card(&request).await?;
            info!(account_id, card_id = card.id, last4 = %card.last4, "Issued card");
            Ok::<_, WorkbenchError>(card)
        }
        .await;
        logged("issue_card", result)
    }

    /// Active identity key and access token
    fn bearer(&self) -> WorkbenchResult<(String, String)> {
        let active = self.registry.require_active()?;
        Ok((active.key.clone(), active.access_token.clone()))
    }
}

fn logged<T>(operation: &str, result: WorkbenchResult<T>) -> WorkbenchResult<T> {
    if let Err(e) = &result {
        warn!(operation, error = %e, "Operation failed");
    }
    result
}
