//! Request and response bodies of the banking API
//!
//! Amounts are integers in minor units (cents). Timestamps are kept as the
//! strings the server sends.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use teller_core::{AccountSummary, IssuedTokens};

/// Error returned when parsing one of the API's enumerations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}', expected one of: {expected}")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

macro_rules! api_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseKindError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err(ParseKindError {
                        kind: $kind,
                        value: value.to_string(),
                        expected: concat!($($wire, " "),+),
                    }),
                }
            }
        }
    };
}

api_enum!(
    /// Kind of bank account
    #[derive(Default)]
    AccountType, "account type" {
        #[default]
        Checking => "checking",
        Savings => "savings",
    }
);

api_enum!(
    /// Ledger entry kind
    TransactionType, "transaction type" {
        Deposit => "deposit",
        Withdrawal => "withdrawal",
        TransferIn => "transfer_in",
        TransferOut => "transfer_out",
    }
);

api_enum!(
    /// Payment card form factor
    CardType, "card type" {
        Virtual => "virtual",
        Physical => "physical",
    }
);

/// `POST /v1/auth/signup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRead {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolderRead {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupResponse {
    pub user: UserRead,
    pub account_holder: AccountHolderRead,
}

/// `POST /v1/auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /v1/auth/refresh`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login and refresh response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for IssuedTokens {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        }
    }
}

/// `GET /v1/auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
}

/// `GET /v1/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// `POST /v1/accounts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreate {
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRead {
    pub id: i64,
    pub holder_id: i64,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub balance: i64,
    pub status: String,
    pub created_at: String,
}

impl From<&AccountRead> for AccountSummary {
    fn from(account: &AccountRead) -> Self {
        Self::new(account.id, account.account_type.as_str()).with_currency(&account.currency)
    }
}

/// `POST /v1/transactions`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCreate {
    pub account_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRead {
    pub id: i64,
    pub account_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub currency: String,
    pub created_at: String,
}

/// `POST /v1/transfers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCreate {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRead {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub currency: String,
    pub created_at: String,
}

/// `GET /v1/statements/{account_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementResponse {
    pub account_id: i64,
    pub currency: String,
    pub balance: i64,
    pub generated_at: String,
    #[serde(default)]
    pub transactions: Vec<TransactionRead>,
}

/// `POST /v1/cards`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCreate {
    pub account_id: i64,
    #[serde(rename = "type")]
    pub card_type: CardType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRead {
    pub id: i64,
    pub account_id: i64,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub last4: String,
    pub status: String,
    pub created_at: String,
}
