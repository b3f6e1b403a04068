//! Line-oriented shell over the workbench
//!
//! The loop waits on three sources at once: operator input, refresh prompts
//! raised by the expiry notifier, and answered prompts. While a prompt is
//! pending the next input line is taken as its yes/no answer.

use crate::prompt::{PromptRequest, parse_decision};
use crate::workbench::Workbench;
use anyhow::Result;
use std::fmt::Display;
use std::io::Write;
use std::time::Duration;
use teller_core::{ExpiryEvent, RefreshDecision, Ticker};
use teller_http::types::{AccountType, CardType, SignupRequest};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::flow::{DEFAULT_CURRENCY, DEFAULT_FIRST_NAME, DEFAULT_LAST_NAME, default_dob};

const HELP: &str = "\
Commands:
  signup <email> <password> [first] [last] [dob]
  login <email> <password> [device-id]
  refresh                      rotate the active identity's tokens
  switch <email>               make another logged-in identity active
  identities                   list logged-in identities
  status                       show the active token's remaining lifetime
  me                           ask the server who the token belongs to
  accounts                     list accounts created this session
  remote-accounts              list accounts from the server
  open <checking|savings> [currency]
  deposit <account> <amount> [currency]
  withdraw <account> <amount> [currency]
  transfer <from> <to> <amount> [currency]
  statement <account>
  card <account> <virtual|physical>
  health
  quit";

/// Why a shell line could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unknown command '{0}'. Type 'help' for a list.")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

/// One parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Quit,
    Signup(SignupRequest),
    Login {
        email: String,
        password: String,
        device_id: Option<String>,
    },
    Refresh,
    Switch(String),
    Identities,
    Status,
    Me,
    Accounts,
    RemoteAccounts,
    Open {
        account_type: AccountType,
        currency: String,
    },
    Deposit {
        account_id: i64,
        amount: i64,
        currency: String,
    },
    Withdraw {
        account_id: i64,
        amount: i64,
        currency: String,
    },
    Transfer {
        from: i64,
        to: i64,
        amount: i64,
        currency: String,
    },
    Statement(i64),
    Card {
        account_id: i64,
        card_type: CardType,
    },
    Health,
}

fn parse_value<T>(field: &'static str, value: &str) -> Result<T, ParseError>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| ParseError::InvalidValue {
        field,
        message: e.to_string(),
    })
}

fn currency_arg(args: &[&str], index: usize) -> String {
    args.get(index)
        .map_or_else(|| DEFAULT_CURRENCY.to_string(), |c| c.to_uppercase())
}

impl ShellCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            ("signup", [email, password, rest @ ..]) if rest.len() <= 3 => {
                Self::Signup(SignupRequest {
                    email: (*email).to_string(),
                    password: (*password).to_string(),
                    first_name: rest.first().unwrap_or(&DEFAULT_FIRST_NAME).to_string(),
                    last_name: rest.get(1).unwrap_or(&DEFAULT_LAST_NAME).to_string(),
                    dob: rest
                        .get(2)
                        .map(|dob| parse_value("date of birth", dob))
                        .transpose()?
                        .unwrap_or_else(default_dob),
                })
            }
            ("signup", _) => {
                return Err(ParseError::Usage("signup <email> <password> [first] [last] [dob]"));
            }
            ("login", [email, password]) => Self::Login {
                email: (*email).to_string(),
                password: (*password).to_string(),
                device_id: None,
            },
            ("login", [email, password, device]) => Self::Login {
                email: (*email).to_string(),
                password: (*password).to_string(),
                device_id: Some((*device).to_string()),
            },
            ("login", _) => return Err(ParseError::Usage("login <email> <password> [device-id]")),
            ("refresh", []) => Self::Refresh,
            ("switch", [email]) => Self::Switch((*email).to_string()),
            ("switch", _) => return Err(ParseError::Usage("switch <email>")),
            ("identities", []) => Self::Identities,
            ("status", []) => Self::Status,
            ("me", []) => Self::Me,
            ("accounts", []) => Self::Accounts,
            ("remote-accounts", []) => Self::RemoteAccounts,
            ("open", [kind, ..]) if args.len() <= 2 => Self::Open {
                account_type: parse_value("account type", kind)?,
                currency: currency_arg(args, 1),
            },
            ("open", _) => return Err(ParseError::Usage("open <checking|savings> [currency]")),
            ("deposit" | "withdraw", [account, amount, ..]) if args.len() <= 3 => {
                let account_id = parse_value("account", account)?;
                let amount = parse_value("amount", amount)?;
                let currency = currency_arg(args, 2);
                if name.eq_ignore_ascii_case("deposit") {
                    Self::Deposit {
                        account_id,
                        amount,
                        currency,
                    }
                } else {
                    Self::Withdraw {
                        account_id,
                        amount,
                        currency,
                    }
                }
            }
            ("deposit", _) => return Err(ParseError::Usage("deposit <account> <amount> [currency]")),
            ("withdraw", _) => {
                return Err(ParseError::Usage("withdraw <account> <amount> [currency]"));
            }
            ("transfer", [from, to, amount, ..]) if args.len() <= 4 => Self::Transfer {
                from: parse_value("from account", from)?,
                to: parse_value("to account", to)?,
                amount: parse_value("amount", amount)?,
                currency: currency_arg(args, 3),
            },
            ("transfer", _) => {
                return Err(ParseError::Usage("transfer <from> <to> <amount> [currency]"));
            }
            ("statement", [account]) => Self::Statement(parse_value("account", account)?),
            ("statement", _) => return Err(ParseError::Usage("statement <account>")),
            ("card", [account, kind]) => Self::Card {
                account_id: parse_value("account", account)?,
                card_type: parse_value("card type", kind)?,
            },
            ("card", _) => return Err(ParseError::Usage("card <account> <virtual|physical>")),
            ("health", []) => Self::Health,
            ("refresh" | "identities" | "status" | "me" | "accounts" | "remote-accounts"
            | "health", _) => return Err(ParseError::Usage("command takes no arguments")),
            (other, _) => return Err(ParseError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Interactive shell bound to one workbench
pub struct Shell<R, W> {
    workbench: Workbench,
    prompts: mpsc::Receiver<PromptRequest>,
    events: broadcast::Receiver<ExpiryEvent>,
    ticker: Ticker,
    input: tokio::io::Lines<R>,
    output: W,
    pending: Option<PromptRequest>,
}

impl<R: AsyncBufRead + Unpin, W: Write> Shell<R, W> {
    pub fn new(
        workbench: Workbench,
        prompts: mpsc::Receiver<PromptRequest>,
        tick_interval: Duration,
        input: R,
        output: W,
    ) -> Self {
        let events = workbench.expiry_events();
        let ticker = workbench.ticker(tick_interval);
        Self {
            workbench,
            prompts,
            events,
            ticker,
            input: input.lines(),
            output,
            pending: None,
        }
    }

    pub const fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    /// Run until `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.say("Banking API shell. Type 'help' for commands.")?;
        let mut prompts_open = true;
        let mut events_open = true;

        loop {
            tokio::select! {
                line = self.input.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed, leaving shell");
                        break;
                    };
                    if !self.handle_line(&line).await? {
                        break;
                    }
                }
                request = self.prompts.recv(), if prompts_open => match request {
                    Some(request) => self.raise_prompt(request)?,
                    None => prompts_open = false,
                },
                event = self.events.recv(), if events_open => match event {
                    Ok(event) => self.handle_event(event).await?,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Missed expiry events");
                    }
                    Err(broadcast::error::RecvError::Closed) => events_open = false,
                },
            }
        }

        // Unanswered prompt lets the token expire
        if let Some(request) = self.pending.take() {
            request.answer(RefreshDecision::LetExpire);
        }
        Ok(())
    }

    fn raise_prompt(&mut self, request: PromptRequest) -> Result<()> {
        self.say(format!(
            "Session for {} expires soon ({}). Refresh now? [y/n]",
            request.due.email,
            self.workbench.token_status()
        ))?;
        if let Some(previous) = self.pending.replace(request) {
            previous.answer(RefreshDecision::LetExpire);
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: ExpiryEvent) -> Result<()> {
        let ExpiryEvent::Prompted { due, decision } = event;
        match decision {
            RefreshDecision::LetExpire => {
                self.say(format!("Session for {} will expire.", due.email))?;
            }
            RefreshDecision::RefreshNow => {
                if self.workbench.registry().active_key() != Some(due.key.as_str()) {
                    info!(identity = %due.key, "Identity no longer active, skipping refresh");
                    return self.say(format!(
                        "Session for {} is no longer active; not refreshing.",
                        due.email
                    ));
                }
                match self.workbench.refresh_active().await {
                    Ok(identity) => self.say(format!("Refreshed session for {}.", identity.email))?,
                    Err(e) => self.say(format!("Refresh failed: {e}"))?,
                }
            }
        }
        Ok(())
    }

    /// Returns `false` when the shell should exit
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        if let Some(request) = self.pending.take() {
            match parse_decision(line) {
                Some(decision) => request.answer(decision),
                None => {
                    self.say("Please answer y or n.")?;
                    self.pending = Some(request);
                }
            }
            return Ok(true);
        }

        let command = match ShellCommand::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(true),
            Err(e) => {
                self.say(e)?;
                return Ok(true);
            }
        };

        if command == ShellCommand::Quit {
            return Ok(false);
        }
        self.execute(command).await?;
        Ok(true)
    }

    async fn execute(&mut self, command: ShellCommand) -> Result<()> {
        let wb = &mut self.workbench;
        let message = match command {
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Quit => String::new(),
            ShellCommand::Signup(request) => report(
                wb.signup(&request)
                    .await
                    .map(|r| format!("Signed up {} (user {})", r.user.email, r.user.id)),
            ),
            ShellCommand::Login {
                email,
                password,
                device_id,
            } => report(
                wb.login(&email, &password, device_id.as_deref())
                    .await
                    .map(|identity| format!("Logged in as {}", identity.email)),
            ),
            ShellCommand::Refresh => report(
                wb.refresh_active()
                    .await
                    .map(|identity| format!("Refreshed session for {}", identity.email)),
            ),
            ShellCommand::Switch(email) => report(
                wb.switch_to(&email)
                    .map(|identity| format!("Active identity: {}", identity.email)),
            ),
            ShellCommand::Identities => {
                let active = wb.registry().active_key();
                let lines: Vec<String> = wb
                    .registry()
                    .identities()
                    .map(|identity| {
                        let marker = if Some(identity.key.as_str()) == active { "*" } else { " " };
                        format!(
                            "{marker} {} ({} accounts)",
                            identity.email,
                            identity.accounts.len()
                        )
                    })
                    .collect();
                if lines.is_empty() {
                    "No identities logged in.".to_string()
                } else {
                    lines.join("\n")
                }
            }
            ShellCommand::Status => self.ticker.status().to_string(),
            ShellCommand::Me => report(
                wb.me()
                    .await
                    .map(|me| format!("User {} <{}>", me.id, me.email)),
            ),
            ShellCommand::Accounts => match wb.registry().active() {
                None => "No identity selected.".to_string(),
                Some(identity) if identity.accounts.is_empty() => {
                    "No accounts created yet.".to_string()
                }
                Some(identity) => identity
                    .accounts
                    .iter()
                    .map(|account| {
                        format!(
                            "#{} {} {}",
                            account.id,
                            account.account_type,
                            account.currency.as_deref().unwrap_or("")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            ShellCommand::RemoteAccounts => report(wb.list_accounts().await.map(|accounts| {
                accounts
                    .iter()
                    .map(|a| {
                        format!(
                            "#{} {} {} balance {} ({})",
                            a.id, a.account_type, a.currency, a.balance, a.status
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })),
            ShellCommand::Open {
                account_type,
                currency,
            } => report(
                wb.create_account(account_type, &currency)
                    .await
                    .map(|a| format!("Opened {} account #{}", a.account_type, a.id)),
            ),
            ShellCommand::Deposit {
                account_id,
                amount,
                currency,
            } => report(
                wb.deposit(account_id, amount, &currency)
                    .await
                    .map(|t| format!("Deposited {} {} (transaction {})", t.amount, t.currency, t.id)),
            ),
            ShellCommand::Withdraw {
                account_id,
                amount,
                currency,
            } => report(
                wb.withdraw(account_id, amount, &currency)
                    .await
                    .map(|t| format!("Withdrew {} {} (transaction {})", t.amount, t.currency, t.id)),
            ),
            ShellCommand::Transfer {
                from,
                to,
                amount,
                currency,
            } => report(wb.transfer(from, to, amount, &currency).await.map(|t| {
                format!(
                    "Transferred {} {} from #{} to #{} (transfer {})",
                    t.amount, t.currency, t.from_account_id, t.to_account_id, t.id
                )
            })),
            ShellCommand::Statement(account_id) => {
                report(wb.statement(account_id).await.map(|statement| {
                    let mut text = format!(
                        "Account #{} balance {} {} ({} entries)",
                        statement.account_id,
                        statement.balance,
                        statement.currency,
                        statement.transactions.len()
                    );
                    for entry in &statement.transactions {
                        text.push_str(&format!(
                            "\n  {} {} {}",
                            entry.created_at, entry.transaction_type, entry.amount
                        ));
                    }
                    text
                }))
            }
            ShellCommand::Card {
                account_id,
                card_type,
            } => report(wb.issue_card(account_id, card_type).await.map(|card| {
                format!(
                    "Issued {} card ending {} ({})",
                    card.card_type, card.last4, card.status
                )
            })),
            ShellCommand::Health => report(wb.health().await.map(|health| {
                format!(
                    "Service {} (database {})",
                    health.status,
                    health.database.as_deref().unwrap_or("unknown")
                )
            })),
        };
        self.say(message)
    }

    fn say(&mut self, message: impl Display) -> Result<()> {
        writeln!(self.output, "{message}")?;
        self.output.flush()?;
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Render an outcome; failures become an `Error:` line
fn report<E: Display>(result: Result<String, E>) -> String {
    result.unwrap_or_else(|e| format!("Error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ChannelPrompt;
    use crate::workbench::WorkbenchConfig;
    use std::sync::Arc;
    use teller_core::PromptDue;
    use teller_http::ApiClient;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(ShellCommand::parse("   "), Ok(None));
    }

    #[test]
    fn parses_banking_commands() {
        assert_eq!(
            ShellCommand::parse("deposit 3 10000"),
            Ok(Some(ShellCommand::Deposit {
                account_id: 3,
                amount: 10_000,
                currency: "USD".into(),
            }))
        );
        assert_eq!(
            ShellCommand::parse("transfer 1 2 250 eur"),
            Ok(Some(ShellCommand::Transfer {
                from: 1,
                to: 2,
                amount: 250,
                currency: "EUR".into(),
            }))
        );
        assert_eq!(
            ShellCommand::parse("OPEN savings"),
            Ok(Some(ShellCommand::Open {
                account_type: AccountType::Savings,
                currency: "USD".into(),
            }))
        );
        assert_eq!(
            ShellCommand::parse("card 4 virtual"),
            Ok(Some(ShellCommand::Card {
                account_id: 4,
                card_type: CardType::Virtual,
            }))
        );
    }

    #[test]
    fn signup_fills_defaults() {
        let Ok(Some(ShellCommand::Signup(request))) =
            ShellCommand::parse("signup ada@example.com secret")
        else {
            panic!("signup should parse");
        };
        assert_eq!(request.first_name, "Ada");
        assert_eq!(request.last_name, "Lovelace");
        assert_eq!(request.dob, default_dob());
    }

    #[test]
    fn reports_usage_and_bad_values() {
        assert_eq!(
            ShellCommand::parse("login ada@example.com"),
            Err(ParseError::Usage("login <email> <password> [device-id]"))
        );
        assert!(matches!(
            ShellCommand::parse("deposit abc 10"),
            Err(ParseError::InvalidValue { field: "account", .. })
        ));
        assert!(matches!(
            ShellCommand::parse("open gold"),
            Err(ParseError::InvalidValue {
                field: "account type",
                ..
            })
        ));
        assert_eq!(
            ShellCommand::parse("close 4"),
            Err(ParseError::UnknownCommand("close".into()))
        );
    }

    #[tokio::test]
    async fn refresh_answer_for_inactive_identity_is_skipped() {
        let (prompt, requests) = ChannelPrompt::new();
        let workbench = Workbench::new(
            ApiClient::new("http://127.0.0.1:9").unwrap(),
            Arc::new(prompt),
            WorkbenchConfig::default(),
        );
        let input: &[u8] = b"";
        let mut shell = Shell::new(workbench, requests, Duration::from_secs(1), input, Vec::new());

        let due = PromptDue {
            key: "ada@example.com".into(),
            email: "ada@example.com".into(),
            expires_at: 0,
        };
        shell
            .handle_event(ExpiryEvent::Prompted {
                due,
                decision: RefreshDecision::RefreshNow,
            })
            .await
            .unwrap();

        let output = String::from_utf8(shell.into_output()).unwrap();
        assert_eq!(
            output,
            "Session for ada@example.com is no longer active; not refreshing.\n"
        );
    }
}
