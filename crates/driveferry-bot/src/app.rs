use std::sync::Arc;

use anyhow::Context;
use driveferry_core::{Config, FileSource, Notifier};
use driveferry_services::{
    JsonLedger, OrchestratorSettings, TransferEngine, UploadLedger, UploadOrchestrator,
};
use driveferry_storage::{create_credential_provider, create_destination};
use driveferry_telegram::TelegramClient;

use crate::dispatch::{DispatchSettings, Dispatcher};

pub async fn open_ledger(config: &Config) -> anyhow::Result<JsonLedger> {
    JsonLedger::open(&config.ledger_path)
        .await
        .with_context(|| format!("Failed to open ledger {}", config.ledger_path.display()))
}

/// Build the dispatcher and everything it depends on.
pub async fn build_dispatcher(
    config: &Config,
    telegram: Arc<TelegramClient>,
) -> anyhow::Result<Dispatcher> {
    let destination = create_destination(config)
        .await
        .context("Failed to initialize destination")?;
    let credentials =
        create_credential_provider(config).context("Failed to initialize credentials")?;
    let ledger: Arc<dyn UploadLedger> = Arc::new(open_ledger(config).await?);

    let destination_label = destination.label();
    let source: Arc<dyn FileSource> = telegram.clone();
    let notifier: Arc<dyn Notifier> = telegram;

    let engine = TransferEngine::new(source, destination, config.staging_dir.clone());
    let orchestrator = UploadOrchestrator::new(
        credentials,
        engine,
        Arc::clone(&ledger),
        Arc::clone(&notifier),
        OrchestratorSettings {
            max_file_size_bytes: config.max_file_size_bytes(),
            folder_id: config.drive_folder_id.clone(),
            progress_step_percent: config.progress_step_percent,
        },
    );

    tracing::info!(
        backend = %config.storage_backend,
        max_file_size_mb = config.max_file_size_mb,
        folder_configured = config.drive_folder_id.is_some(),
        ledger = %config.ledger_path.display(),
        staging_dir = %config.staging_dir.display(),
        "Upload pipeline ready"
    );

    Ok(Dispatcher::new(
        orchestrator,
        ledger,
        notifier,
        DispatchSettings {
            history_cap: config.history_display_cap,
            max_file_size_mb: config.max_file_size_mb,
            destination_label,
        },
    ))
}
