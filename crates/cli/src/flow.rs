//! Scripted flows read from a JSON file
//!
//! ```json
//! {
//!   "base_url": "http://localhost:8000",
//!   "steps": [
//!     {"action": "login", "email": "ada@example.com", "password": "pw"},
//!     {"action": "create_account", "type": "checking", "save_as": "main"},
//!     {"action": "deposit", "account_ref": "main", "amount": 10000}
//!   ]
//! }
//! ```
//!
//! Steps run in order and the first failure stops the flow.

use crate::error::{FlowError, WorkbenchError, WorkbenchResult};
use crate::workbench::Workbench;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use teller_http::types::{AccountType, SignupRequest, StatementResponse};
use tracing::info;

pub const DEFAULT_FIRST_NAME: &str = "Ada";
pub const DEFAULT_LAST_NAME: &str = "Lovelace";
pub const DEFAULT_CURRENCY: &str = "USD";

/// Default date of birth for generated signups, 1990-01-01
pub fn default_dob() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default()
}

fn default_first_name() -> String {
    DEFAULT_FIRST_NAME.to_string()
}

fn default_last_name() -> String {
    DEFAULT_LAST_NAME.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Contents of a flow file
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
}

impl FlowConfig {
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let raw = std::fs::read_to_string(path).map_err(|source| FlowError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| FlowError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// An account given either as a literal id or as a saved name
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    Id(i64),
    Name(String),
}

/// One flow action
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    Signup {
        email: String,
        password: String,
        #[serde(default = "default_first_name")]
        first_name: String,
        #[serde(default = "default_last_name")]
        last_name: String,
        #[serde(default = "default_dob")]
        dob: NaiveDate,
    },
    Login {
        email: String,
        password: String,
        #[serde(default)]
        device_id: Option<String>,
    },
    CreateAccount {
        #[serde(rename = "type", default)]
        account_type: AccountType,
        #[serde(default = "default_currency")]
        currency: String,
        #[serde(default)]
        save_as: Option<String>,
    },
    Deposit {
        #[serde(default)]
        account_id: Option<AccountRef>,
        #[serde(default)]
        account_ref: Option<AccountRef>,
        amount: i64,
        #[serde(default = "default_currency")]
        currency: String,
    },
    Withdraw {
        #[serde(default)]
        account_id: Option<AccountRef>,
        #[serde(default)]
        account_ref: Option<AccountRef>,
        amount: i64,
        #[serde(default = "default_currency")]
        currency: String,
    },
    Transfer {
        #[serde(default)]
        from_account_id: Option<AccountRef>,
        #[serde(default)]
        from_account_ref: Option<AccountRef>,
        #[serde(default)]
        to_account_id: Option<AccountRef>,
        #[serde(default)]
        to_account_ref: Option<AccountRef>,
        amount: i64,
        #[serde(default = "default_currency")]
        currency: String,
    },
    Statement {
        #[serde(default)]
        account_id: Option<AccountRef>,
        #[serde(default)]
        account_ref: Option<AccountRef>,
        #[serde(default)]
        save_as: Option<String>,
    },
}

impl FlowStep {
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Signup { .. } => "signup",
            Self::Login { .. } => "login",
            Self::CreateAccount { .. } => "create_account",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Transfer { .. } => "transfer",
            Self::Statement { .. } => "statement",
        }
    }
}

/// Value remembered under a `save_as` name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Saved {
    Account(i64),
    Statement(StatementResponse),
}

/// Executes flow steps against a workbench, remembering saved values
#[derive(Debug, Default)]
pub struct FlowRunner {
    saved: HashMap<String, Saved>,
}

impl FlowRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self, name: &str) -> Option<&Saved> {
        self.saved.get(name)
    }

    /// Run every step, stopping at the first failure
    ///
    /// Returns the number of steps completed.
    pub async fn run(
        &mut self,
        workbench: &mut Workbench,
        steps: &[FlowStep],
    ) -> Result<usize, FlowError> {
        for (index, step) in steps.iter().enumerate() {
            let action = step.action();
            info!(step = index + 1, action, "Running step");
            self.run_step(workbench, step)
                .await
                .map_err(|source| FlowError::Step {
                    index: index + 1,
                    action,
                    source,
                })?;
        }
        info!(steps = steps.len(), "Flow completed");
        Ok(steps.len())
    }

    async fn run_step(&mut self, workbench: &mut Workbench, step: &FlowStep) -> WorkbenchResult<()> {
        match step {
            FlowStep::Signup {
                email,
                password,
                first_name,
                last_name,
                dob,
            } => {
                let request = SignupRequest {
                    email: email.clone(),
                    password: password.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    dob: *dob,
                };
                workbench.signup(&request).await?;
            }
            FlowStep::Login {
                email,
                password,
                device_id,
            } => {
                workbench
                    .login(email, password, device_id.as_deref())
                    .await?;
            }
            FlowStep::CreateAccount {
                account_type,
                currency,
                save_as,
            } => {
                let account = workbench.create_account(*account_type, currency).await?;
                if let Some(name) = save_as {
                    self.saved.insert(name.clone(), Saved::Account(account.id));
                }
            }
            FlowStep::Deposit {
                account_id,
                account_ref,
                amount,
                currency,
            } => {
                let account = self.resolve(account_id.as_ref(), account_ref.as_ref(), "account")?;
                workbench.deposit(account, *amount, currency).await?;
            }
            FlowStep::Withdraw {
                account_id,
                account_ref,
                amount,
                currency,
            } => {
                let account = self.resolve(account_id.as_ref(), account_ref.as_ref(), "account")?;
                workbench.withdraw(account, *amount, currency).await?;
            }
            FlowStep::Transfer {
                from_account_id,
                from_account_ref,
                to_account_id,
                to_account_ref,
                amount,
                currency,
            } => {
                let from = self.resolve(
                    from_account_id.as_ref(),
                    from_account_ref.as_ref(),
                    "from_account",
                )?;
                let to = self.resolve(to_account_id.as_ref(), to_account_ref.as_ref(), "to_account")?;
                workbench.transfer(from, to, *amount, currency).await?;
            }
            FlowStep::Statement {
                account_id,
                account_ref,
                save_as,
            } => {
                let account = self.resolve(account_id.as_ref(), account_ref.as_ref(), "account")?;
                let statement = workbench.statement(account).await?;
                if let Some(name) = save_as {
                    self.saved.insert(name.clone(), Saved::Statement(statement));
                }
            }
        }
        Ok(())
    }

    /// Resolve an account given by id or by saved name; the id field wins
    fn resolve(
        &self,
        id: Option<&AccountRef>,
        reference: Option<&AccountRef>,
        label: &str,
    ) -> WorkbenchResult<i64> {
        match id.or(reference) {
            Some(AccountRef::Id(id)) => Ok(*id),
            Some(AccountRef::Name(name)) => match self.saved.get(name) {
                Some(Saved::Account(id)) => Ok(*id),
                _ => Err(WorkbenchError::UnknownReference(format!("{label} {name}"))),
            },
            None => Err(WorkbenchError::UnknownReference(format!("{label} (missing)"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_take_defaults() {
        let config: FlowConfig = serde_json::from_value(json!({
            "steps": [
                {"action": "signup", "email": "ada@example.com", "password": "pw"},
                {"action": "create_account", "save_as": "main"},
                {"action": "transfer", "from_account_ref": "main", "to_account_id": 7, "amount": 25}
            ]
        }))
        .unwrap();

        assert_eq!(config.base_url, None);
        match &config.steps[0] {
            FlowStep::Signup {
                first_name, dob, ..
            } => {
                assert_eq!(first_name, "Ada");
                assert_eq!(dob.to_string(), "1990-01-01");
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &config.steps[1] {
            FlowStep::CreateAccount {
                account_type,
                currency,
                ..
            } => {
                assert_eq!(*account_type, AccountType::Checking);
                assert_eq!(currency, "USD");
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &config.steps[2] {
            FlowStep::Transfer {
                from_account_ref,
                to_account_id,
                ..
            } => {
                assert_eq!(from_account_ref, &Some(AccountRef::Name("main".into())));
                assert_eq!(to_account_id, &Some(AccountRef::Id(7)));
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<FlowConfig, _> =
            serde_json::from_value(json!({"steps": [{"action": "close_account"}]}));
        assert!(result.is_err());
    }

    #[test]
    fn references_resolve_to_saved_accounts_only() {
        let mut runner = FlowRunner::new();
        runner.saved.insert("main".into(), Saved::Account(3));
        runner.saved.insert(
            "report".into(),
            Saved::Statement(StatementResponse {
                account_id: 3,
                currency: "USD".into(),
                balance: 0,
                generated_at: "2025-01-01T00:00:00Z".into(),
                transactions: Vec::new(),
            }),
        );

        let main = AccountRef::Name("main".into());
        assert_eq!(runner.resolve(None, Some(&main), "account").unwrap(), 3);
        assert_eq!(
            runner
                .resolve(Some(&AccountRef::Id(9)), Some(&main), "account")
                .unwrap(),
            9
        );

        let report = AccountRef::Name("report".into());
        assert!(matches!(
            runner.resolve(None, Some(&report), "account"),
            Err(WorkbenchError::UnknownReference(_))
        ));
        assert!(runner.resolve(None, None, "account").is_err());
    }
}
