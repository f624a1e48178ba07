use crate::credentials::Session;
use crate::traits::{Destination, ProgressSender, TransferError, TransferResult};
use crate::StorageBackend;
use async_trait::async_trait;
use driveferry_core::models::{DestinationMetadata, RemoteObject, UploadProgress};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Local filesystem destination
///
/// Files land under `base_path/[parent_id/]{uuid}-{name}`. The uuid doubles as
/// the remote id.
#[derive(Clone)]
pub struct LocalDestination {
    base_path: PathBuf,
    base_url: Option<String>,
    chunk_size: usize,
}

impl LocalDestination {
    /// Create a new LocalDestination
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored files (e.g., "/srv/driveferry")
    /// * `base_url` - Base URL the directory is served under, if any
    /// * `chunk_size` - Bytes copied between progress events
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: Option<String>,
        chunk_size: usize,
    ) -> TransferResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            TransferError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalDestination {
            base_path,
            base_url,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Reduce a user-supplied name to a single safe path component.
    fn sanitize_component(name: &str) -> String {
        let cleaned: String = name
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c => c,
            })
            .collect();

        match cleaned.trim() {
            "" | "." | ".." => "file".to_string(),
            s => s.to_string(),
        }
    }

    fn relative_key(id: &Uuid, metadata: &DestinationMetadata) -> String {
        let file = format!("{}-{}", id, Self::sanitize_component(&metadata.name));
        match metadata.parent_id.as_deref() {
            Some(parent) => format!("{}/{}", Self::sanitize_component(parent), file),
            None => file,
        }
    }

    fn generate_url(&self, key: &str) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), key))
    }

    async fn copy_with_progress(
        &self,
        staging_path: &Path,
        target: &Path,
        progress: &ProgressSender,
    ) -> TransferResult<u64> {
        let mut reader = fs::File::open(staging_path).await?;
        let total = reader.metadata().await?.len();

        let mut writer = fs::File::create(target).await.map_err(|e| {
            TransferError::UploadFailed(format!("Failed to create file {}: {}", target.display(), e))
        })?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut written: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await.map_err(|e| {
                TransferError::UploadFailed(format!("Failed to write file {}: {}", target.display(), e))
            })?;
            written += n as u64;
            let _ = progress.send(UploadProgress::new(written, total));
        }

        writer.sync_all().await.map_err(|e| {
            TransferError::UploadFailed(format!("Failed to sync file {}: {}", target.display(), e))
        })?;

        if total == 0 {
            let _ = progress.send(UploadProgress::new(0, 0));
        }

        Ok(written)
    }
}

#[async_trait]
impl Destination for LocalDestination {
    async fn push(
        &self,
        staging_path: &Path,
        metadata: &DestinationMetadata,
        _session: &Session,
        progress: ProgressSender,
    ) -> TransferResult<RemoteObject> {
        let start = std::time::Instant::now();
        let id = Uuid::new_v4();
        let key = Self::relative_key(&id, metadata);
        let path = self.base_path.join(&key);
        let partial = path.with_extension("part");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let size = match self.copy_with_progress(staging_path, &partial, &progress).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        fs::rename(&partial, &path).await.map_err(|e| {
            TransferError::UploadFailed(format!("Failed to finalize {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(RemoteObject {
            id: id.to_string(),
            name: metadata.name.clone(),
            link: self.generate_url(&key),
        })
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn label(&self) -> &'static str {
        "local storage"
    }
}
