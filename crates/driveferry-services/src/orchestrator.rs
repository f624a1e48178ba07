//! Upload orchestration: validate → authorize → download → upload → record → notify → clean up.
//!
//! One [`UploadOrchestrator::run`] call drives a single inbound file to a
//! terminal state and returns the states it passed through. Job-fatal errors
//! stop the pipeline where they occur; ledger, notifier and cleanup failures
//! are logged and collected as warnings without changing the outcome. Staging
//! cleanup runs last on every path.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use driveferry_core::models::{
    DestinationMetadata, InboundFile, LedgerEntry, RemoteObject, UploadProgress,
};
use driveferry_core::{ErrorMetadata, JobError, LogLevel, Notifier, StatusMessage};
use driveferry_storage::{CredentialProvider, TransferError};
use tokio::sync::mpsc;

use crate::ledger::UploadLedger;
use crate::messages;
use crate::progress::ProgressThrottle;
use crate::transfer::TransferEngine;

/// Policy knobs of the pipeline
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_file_size_bytes: u64,
    /// Destination container; `None` uploads to the root
    pub folder_id: Option<String>,
    pub progress_step_percent: u8,
}

/// One inbound file and who sent it
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub file: InboundFile,
    pub owner_id: i64,
    pub chat_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Received,
    Validated,
    Authorized,
    Downloaded,
    Uploaded,
    Recorded,
    Notified,
    Cleaned,
    Failed(JobError),
}

/// What happened to one job
#[derive(Debug, Clone, Default)]
pub struct JobReport {
    pub transitions: Vec<JobState>,
    /// Confirmed object, set once the destination accepted the file
    pub remote: Option<RemoteObject>,
    /// Non-fatal problems: ledger, notifier and cleanup failures
    pub warnings: Vec<JobError>,
}

impl JobReport {
    fn enter(&mut self, state: JobState) {
        self.transitions.push(state);
    }

    /// The fatal error that ended the job, if any.
    pub fn failure(&self) -> Option<&JobError> {
        self.transitions.iter().find_map(|s| match s {
            JobState::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn succeeded(&self) -> bool {
        self.remote.is_some() && self.failure().is_none()
    }

    pub fn reached(&self, state: &JobState) -> bool {
        self.transitions.contains(state)
    }
}

pub struct UploadOrchestrator {
    credentials: Arc<dyn CredentialProvider>,
    engine: TransferEngine,
    ledger: Arc<dyn UploadLedger>,
    notifier: Arc<dyn Notifier>,
    settings: OrchestratorSettings,
}

impl UploadOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        engine: TransferEngine,
        ledger: Arc<dyn UploadLedger>,
        notifier: Arc<dyn Notifier>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            credentials,
            engine,
            ledger,
            notifier,
            settings,
        }
    }

    /// Drive one job to a terminal state. Never fails: the outcome is in the report.
    #[tracing::instrument(
        skip(self, job),
        fields(file_id = %job.file.identifier, owner_id = job.owner_id, name = %job.file.display_name)
    )]
    pub async fn run(&self, job: UploadJob) -> JobReport {
        let start = Instant::now();
        let mut report = JobReport::default();
        report.enter(JobState::Received);

        let staging = self.engine.staging_path(&job.file.identifier);
        let mut status: Option<StatusMessage> = None;

        match self.execute(&job, &staging, &mut status, &mut report).await {
            Ok(object) => {
                self.record(&job, &object, &mut report).await;

                let text = messages::upload_succeeded(&object.name, object.link.as_deref());
                if self.post(&job, &mut status, &text, &mut report).await {
                    report.enter(JobState::Notified);
                }
                report.remote = Some(object);
            }
            Err(err) => {
                log_failure(&err);
                report.enter(JobState::Failed(err.clone()));

                if self
                    .post(&job, &mut status, &err.client_message(), &mut report)
                    .await
                {
                    report.enter(JobState::Notified);
                }
            }
        }

        self.clean_up(&staging, &mut report).await;

        tracing::info!(
            success = report.succeeded(),
            warnings = report.warnings.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload job finished"
        );

        report
    }

    /// Stages up to `Uploaded`; returns the confirmed object or the fatal error.
    async fn execute(
        &self,
        job: &UploadJob,
        staging: &Path,
        status: &mut Option<StatusMessage>,
        report: &mut JobReport,
    ) -> Result<RemoteObject, JobError> {
        let file = &job.file;

        // Size first: an oversize file costs no network call at all.
        if file.declared_size > self.settings.max_file_size_bytes {
            return Err(JobError::SizeLimitExceeded {
                file_name: file.display_name.clone(),
                size_bytes: file.declared_size,
                limit_bytes: self.settings.max_file_size_bytes,
            });
        }
        report.enter(JobState::Validated);

        let session = self
            .credentials
            .acquire_session()
            .await
            .map_err(|e| JobError::AuthUnavailable(e.to_string()))?;
        report.enter(JobState::Authorized);

        self.post(job, status, &messages::downloading(&file.display_name), report)
            .await;

        let size = self
            .engine
            .fetch_to_staging(&file.identifier, staging)
            .await
            .map_err(|e| JobError::DownloadFailed(e.to_string()))?;
        report.enter(JobState::Downloaded);

        tracing::debug!(size_bytes = size, declared_size = file.declared_size, "Download complete");

        let label = self.engine.destination_label();
        self.post(job, status, &messages::uploading(&file.display_name, label), report)
            .await;

        let metadata = DestinationMetadata {
            name: file.display_name.clone(),
            parent_id: self.settings.folder_id.clone(),
            mime_type: file.mime_type.clone(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let upload = self
            .engine
            .push_to_destination(staging, &metadata, &session, tx);
        let relay = self.relay_progress(rx, *status, &file.display_name, label);
        // The relay ends when the destination drops its sender.
        let (result, progress_warnings) = tokio::join!(upload, relay);
        report.warnings.extend(progress_warnings);

        let object = result.map_err(|e| match e {
            TransferError::IncompleteConfirmation(cause) => JobError::IncompleteConfirmation(cause),
            other => JobError::UploadFailed(other.to_string()),
        })?;
        report.enter(JobState::Uploaded);

        Ok(object)
    }

    /// Turn progress events into throttled edits of the status message.
    async fn relay_progress(
        &self,
        mut rx: mpsc::UnboundedReceiver<UploadProgress>,
        status: Option<StatusMessage>,
        name: &str,
        label: &str,
    ) -> Vec<JobError> {
        let mut throttle = ProgressThrottle::new(self.settings.progress_step_percent);
        let mut warnings = Vec::new();

        while let Some(progress) = rx.recv().await {
            tracing::trace!(
                bytes_sent = progress.bytes_sent,
                total_bytes = progress.total_bytes,
                "Upload progress"
            );

            let Some(percent) = throttle.observe(progress) else {
                continue;
            };
            tracing::info!(percent, "Uploading");

            if let Some(message) = status.as_ref() {
                let text = messages::upload_progress(name, label, percent);
                if let Err(e) = self.notifier.edit(message, &text).await {
                    tracing::warn!(error = %e, "Failed to update progress");
                    warnings.push(JobError::NotifyFailed(e.to_string()));
                }
            }
        }

        warnings
    }

    /// Append the ledger entry; the remote object exists whatever happens here.
    async fn record(&self, job: &UploadJob, object: &RemoteObject, report: &mut JobReport) {
        let entry = LedgerEntry::from_remote(object, job.owner_id);
        match self.ledger.append(entry).await {
            Ok(()) => report.enter(JobState::Recorded),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    remote_id = %object.id,
                    "Failed to record upload in ledger"
                );
                report.warnings.push(JobError::LedgerWriteFailed(e.to_string()));
            }
        }
    }

    /// Show `text` to the user: edit the status message in place, or post one
    /// if none exists yet. Returns whether the user got the text.
    async fn post(
        &self,
        job: &UploadJob,
        status: &mut Option<StatusMessage>,
        text: &str,
        report: &mut JobReport,
    ) -> bool {
        let result = match *status {
            Some(message) => self.notifier.edit(&message, text).await,
            None => self.notifier.send(job.chat_id, text).await.map(|message| {
                *status = Some(message);
            }),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, chat_id = job.chat_id, "Failed to notify user");
                report.warnings.push(JobError::NotifyFailed(e.to_string()));
                false
            }
        }
    }

    async fn clean_up(&self, staging: &Path, report: &mut JobReport) {
        match self.engine.discard(staging).await {
            Ok(existed) => {
                if existed {
                    tracing::debug!(path = %staging.display(), "Staging file removed");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, path = %staging.display(), "Failed to remove staging file");
                report.warnings.push(JobError::CleanupFailed(e.to_string()));
            }
        }
        report.enter(JobState::Cleaned);
    }
}

fn log_failure(err: &JobError) {
    match err.log_level() {
        LogLevel::Info => {
            tracing::info!(error_code = err.error_code(), error = %err, "Upload job rejected")
        }
        LogLevel::Warn => {
            tracing::warn!(error_code = err.error_code(), error = %err, "Upload job failed")
        }
        LogLevel::Error => {
            tracing::error!(error_code = err.error_code(), error = %err, "Upload job failed")
        }
    }
}
