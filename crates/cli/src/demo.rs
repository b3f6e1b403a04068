//! Interactive walkthrough: signup, login, two accounts, deposit, transfer,
//! statements. Every question has a default that an empty line accepts.

use crate::flow::{DEFAULT_CURRENCY, DEFAULT_FIRST_NAME, DEFAULT_LAST_NAME, default_dob};
use crate::workbench::Workbench;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::io::Write;
use std::str::FromStr;
use teller_http::types::{AccountType, SignupRequest};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Line-based question and answer over any reader and writer
pub struct Console<R, W> {
    lines: Lines<R>,
    output: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: input.lines(),
            output,
        }
    }

    /// Print a line
    pub fn say(&mut self, message: impl std::fmt::Display) -> Result<()> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }

    /// Ask for a value; an empty answer or end of input yields `default`
    pub async fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        write!(self.output, "{label} [{default}]: ")?;
        self.output.flush()?;
        let answer = self.lines.next_line().await?.unwrap_or_default();
        let answer = answer.trim();
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer.to_string()
        })
    }

    /// Ask for a value and parse it
    pub async fn ask_parsed<T>(&mut self, label: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let answer = self.ask(label, default).await?;
        answer
            .parse()
            .with_context(|| format!("Invalid {label}: {answer}"))
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

/// Balances reported at the end of the walkthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoSummary {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub source_balance: i64,
    pub destination_balance: i64,
}

/// Run the walkthrough, asking for each input on `console`
pub async fn run_demo<R, W>(
    workbench: &mut Workbench,
    console: &mut Console<R, W>,
) -> Result<DemoSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    console.say("Banking demo client (interactive)")?;
    console.say("Amounts are in minor units (cents).")?;

    let email = console.ask("Email", "demo@example.com").await?;
    let password = console.ask("Password", "supersecure123").await?;
    let first_name = console.ask("First name", DEFAULT_FIRST_NAME).await?;
    let last_name = console.ask("Last name", DEFAULT_LAST_NAME).await?;
    let dob: NaiveDate = console
        .ask_parsed("Date of birth (YYYY-MM-DD)", &default_dob().to_string())
        .await?;
    let currency = console.ask("Currency", DEFAULT_CURRENCY).await?;
    let device_id = console.ask("Device ID", workbench.device_id()).await?;

    console.say("==> Signing up")?;
    workbench
        .signup(&SignupRequest {
            email: email.clone(),
            password: password.clone(),
            first_name,
            last_name,
            dob,
        })
        .await?;

    console.say("==> Logging in")?;
    workbench.login(&email, &password, Some(&device_id)).await?;

    let source_type: AccountType = console.ask_parsed("Source account type", "checking").await?;
    let destination_type: AccountType = console
        .ask_parsed("Destination account type", "savings")
        .await?;

    console.say("==> Creating source account")?;
    let source = workbench.create_account(source_type, &currency).await?;
    console.say(format!("==> Source account ID: {}", source.id))?;

    console.say("==> Creating destination account")?;
    let destination = workbench.create_account(destination_type, &currency).await?;
    console.say(format!("==> Destination account ID: {}", destination.id))?;

    let deposit_amount: i64 = console.ask_parsed("Deposit amount", "10000").await?;
    let transfer_amount: i64 = console.ask_parsed("Transfer amount", "2500").await?;

    console.say("==> Depositing funds")?;
    workbench
        .deposit(source.id, deposit_amount, &currency)
        .await?;

    console.say("==> Transferring funds")?;
    workbench
        .transfer(source.id, destination.id, transfer_amount, &currency)
        .await?;

    console.say("==> Fetching statements")?;
    let source_statement = workbench.statement(source.id).await?;
    let destination_statement = workbench.statement(destination.id).await?;

    console.say(format!("Source statement balance: {}", source_statement.balance))?;
    console.say(format!(
        "Destination statement balance: {}",
        destination_statement.balance
    ))?;
    console.say("Demo flow completed successfully.")?;

    Ok(DemoSummary {
        source_account_id: source.id,
        destination_account_id: destination.id,
        source_balance: source_statement.balance,
        destination_balance: destination_statement.balance,
    })
}
