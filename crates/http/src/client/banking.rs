//! Account, ledger and card endpoints

use super::{Authorized, ClientError, json_body};
use crate::types::{
    AccountCreate, AccountRead, CardCreate, CardRead, StatementResponse, TransactionCreate,
    TransactionRead, TransferCreate, TransferRead,
};
use reqwest::Method;

impl Authorized<'_> {
    pub async fn create_account(&self, request: &AccountCreate) -> Result<AccountRead, ClientError> {
        let body = json_body(request)?;
        self.call_json(Method::POST, "/v1/accounts", Some(&body))
            .await
    }

    /// Accounts owned by the bearer
    pub async fn list_accounts(&self) -> Result<Vec<AccountRead>, ClientError> {
        self.call_json(Method::GET, "/v1/accounts", None).await
    }

    /// Post a deposit or withdrawal
    pub async fn create_transaction(
        &self,
        request: &TransactionCreate,
    ) -> Result<TransactionRead, ClientError> {
        let body = json_body(request)?;
        self.call_json(Method::POST, "/v1/transactions", Some(&body))
            .await
    }

    pub async fn create_transfer(
        &self,
        request: &TransferCreate,
    ) -> Result<TransferRead, ClientError> {
        let body = json_body(request)?;
        self.call_json(Method::POST, "/v1/transfers", Some(&body))
            .await
    }

    /// Balance and ledger of one account
    pub async fn statement(&self, account_id: i64) -> Result<StatementResponse, ClientError> {
        let path = format!("/v1/statements/{account_id}");
        self.call_json(Method::GET, &path, None).await
    }

    pub async fn create_card(&self, request: &CardCreate) -> Result<CardRead, ClientError> {
        let body = json_body(request)?;
        self.call_json(Method::POST, "/v1/cards", Some(&body)).await
    }
}
