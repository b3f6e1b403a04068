//! CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use teller::demo::{Console, run_demo};
use teller::flow::{FlowConfig, FlowRunner};
use teller::shell::Shell;
use teller::{ChannelPrompt, Settings, Workbench, WorkbenchConfig};
use teller_core::{FixedPrompt, RefreshDecision, RefreshPrompt};
use teller_http::ApiClient;
use tokio::io::BufReader;
use tracing::info;

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive shell with refresh prompts before tokens expire
    Shell,

    /// Guided walkthrough: signup, login, accounts, deposit, transfer, statements
    Demo,

    /// Run the steps of a JSON flow file
    Run {
        /// Flow file
        #[arg(long = "config", value_name = "FLOW")]
        flow: PathBuf,
    },

    /// Check that the API is reachable
    Health,

    /// Settings inspection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show,

    /// Print where the per-user settings file is looked up
    Path,
}

impl Commands {
    /// Run the command; `base_url` is the `--base-url` flag, which wins over
    /// everything else
    pub async fn execute(self, settings: Settings, base_url: Option<String>) -> Result<()> {
        match self {
            Self::Shell => {
                let (prompt, requests) = ChannelPrompt::new();
                let url = base_url.unwrap_or_else(|| settings.base_url.clone());
                let workbench = workbench(&settings, &url, Arc::new(prompt))?;
                let input = BufReader::new(tokio::io::stdin());
                let mut shell = Shell::new(
                    workbench,
                    requests,
                    settings.tick_interval(),
                    input,
                    std::io::stdout(),
                );
                shell.run().await
            }
            Self::Demo => {
                let url = base_url.unwrap_or_else(|| settings.base_url.clone());
                let mut workbench = workbench(&settings, &url, let_expire())?;
                let mut console = Console::new(BufReader::new(tokio::io::stdin()), std::io::stdout());
                run_demo(&mut workbench, &mut console).await?;
                Ok(())
            }
            Self::Run { flow } => {
                let config = FlowConfig::load(&flow)?;
                let url = base_url
                    .or_else(|| config.base_url.clone())
                    .unwrap_or_else(|| settings.base_url.clone());
                let mut workbench = workbench(&settings, &url, let_expire())?;
                let completed = FlowRunner::new()
                    .run(&mut workbench, &config.steps)
                    .await?;
                println!("Config demo flow completed successfully ({completed} steps).");
                Ok(())
            }
            Self::Health => {
                let url = base_url.unwrap_or_else(|| settings.base_url.clone());
                let workbench = workbench(&settings, &url, let_expire())?;
                let health = workbench.health().await?;
                println!("{}", serde_json::to_string_pretty(&health)?);
                Ok(())
            }
            Self::Config { command } => command.execute(&settings),
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, settings: &Settings) -> Result<()> {
        match self {
            Self::Show => println!("{}", serde_json::to_string_pretty(settings)?),
            Self::Path => match Settings::default_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No per-user configuration directory on this platform"),
            },
        }
        Ok(())
    }
}

/// Prompt used where nobody is around to answer
fn let_expire() -> Arc<dyn RefreshPrompt> {
    Arc::new(FixedPrompt(RefreshDecision::LetExpire))
}

fn workbench(settings: &Settings, base_url: &str, prompt: Arc<dyn RefreshPrompt>) -> Result<Workbench> {
    let mut builder = ApiClient::builder().base_url(base_url);
    if let Some(timeout) = settings.timeout() {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .with_context(|| format!("Invalid base URL {base_url}"))?;
    info!(base_url = client.base_url(), device_id = %settings.device_id, "Using banking API");

    Ok(Workbench::new(
        client,
        prompt,
        WorkbenchConfig {
            device_id: settings.device_id.clone(),
            prompt_window: settings.prompt_window(),
        },
    ))
}
