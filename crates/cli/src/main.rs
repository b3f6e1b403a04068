//! Teller CLI - banking API session client

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use teller::Settings;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "teller")]
#[command(about = "Session-aware client for the banking API")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Banking API base URL (overrides settings and flow files)
    #[arg(short = 'u', long, global = true)]
    base_url: Option<String>,

    /// Device identifier sent on login and refresh
    #[arg(long, global = true)]
    device_id: Option<String>,

    /// Settings file (defaults to the per-user teller.toml)
    #[arg(short = 'c', long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config_file.as_deref())?;
    if let Some(device_id) = cli.device_id {
        settings.device_id = device_id;
    }

    logging::init_logging(cli.log_level.into(), settings.log_format)?;

    info!("Starting Teller CLI");

    match cli.command.execute(settings, cli.base_url).await {
        Ok(()) => {
            info!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
