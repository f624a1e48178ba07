//! Driveferry: relays files sent to a Telegram bot into Google Drive.
//!
//! Configuration comes from the environment (and `.env`); see `TELEGRAM_BOT_TOKEN`,
//! `STORAGE_BACKEND`, `GOOGLE_TOKEN_FILE` and `MAX_FILE_SIZE_MB`.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use driveferry_bot::{build_dispatcher, init_tracing, open_ledger, poll_updates};
use driveferry_core::Config;
use driveferry_services::UploadLedger;
use driveferry_telegram::TelegramClient;

#[derive(Parser)]
#[command(name = "driveferry", about = "Telegram to cloud storage upload bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and poll for messages (default)
    Run,
    /// Print the upload history as JSON
    History {
        /// Only print the most recent N entries
        #[arg(long)]
        latest: Option<usize>,
    },
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal, stopping"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    if config.drive_credentials_missing() {
        tracing::warn!(
            token_file = %config.google_token_file.display(),
            "No Google credentials found; uploads will fail until a token file is provided"
        );
    }

    let telegram = Arc::new(
        TelegramClient::new(config.telegram_api_url.clone(), config.telegram_bot_token.clone())
            .context("Failed to create Telegram client")?,
    );
    let dispatcher = Arc::new(build_dispatcher(&config, Arc::clone(&telegram)).await?);

    poll_updates(
        &telegram,
        dispatcher,
        config.poll_timeout_secs,
        shutdown_signal(),
    )
    .await;

    tracing::info!("Bot stopped");
    Ok(())
}

async fn history(config: Config, latest: Option<usize>) -> anyhow::Result<()> {
    let ledger = open_ledger(&config).await?;
    let entries = ledger.list_all().await?;
    let skip = latest.map_or(0, |n| entries.len().saturating_sub(n));

    let out = serde_json::to_string_pretty(&entries[skip..]).context("Serialize history")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::History { latest } => history(config, latest).await,
    }
}
