//! Destination abstraction trait
//!
//! This module defines the Destination trait that all upload backends must implement.

use std::path::Path;

use async_trait::async_trait;
use driveferry_core::models::{DestinationMetadata, RemoteObject, UploadProgress};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::credentials::Session;
use crate::StorageBackend;

/// Transfer operation errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// Transport or protocol failure; nothing usable was created
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The destination accepted the content but the confirmation lacks fields
    #[error("Incomplete confirmation: {0}")]
    IncompleteConfirmation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Channel on which destinations publish per-chunk progress
///
/// Sends are best-effort: a closed receiver never fails the transfer.
pub type ProgressSender = mpsc::UnboundedSender<UploadProgress>;

/// Destination abstraction trait
///
/// Implementations stream a staged file to the remote side in sequential
/// chunks and return the confirmed object.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Upload the file at `staging_path` and return the confirmed remote object.
    ///
    /// # Arguments
    /// * `staging_path` - Fully written local file
    /// * `metadata` - Target name, optional parent container and mime type
    /// * `session` - Credential session for this transfer
    /// * `progress` - Receives an event after each acknowledged chunk
    async fn push(
        &self,
        staging_path: &Path,
        metadata: &DestinationMetadata,
        session: &Session,
        progress: ProgressSender,
    ) -> TransferResult<RemoteObject>;

    /// Get the backend type
    fn backend_type(&self) -> StorageBackend;

    /// Human-readable name used in status messages
    fn label(&self) -> &'static str;
}
