//! Transfer engine
//!
//! Moves one file from the messaging source into a local staging file, then
//! hands the staged file to the configured destination. A staged file only
//! appears under its final name once the download completed; until then bytes
//! go to a `.part` sibling that is removed on failure.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use driveferry_core::models::{DestinationMetadata, RemoteObject};
use driveferry_core::{FileSource, SourceError};
use driveferry_storage::{Destination, ProgressSender, Session, TransferResult};
use futures::StreamExt;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Staging write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub struct TransferEngine {
    source: Arc<dyn FileSource>,
    destination: Arc<dyn Destination>,
    staging_dir: PathBuf,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Keep identifier characters that are safe in a file name.
fn staging_token(identifier: &str) -> String {
    let token: String = identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    if token.is_empty() {
        "file".to_string()
    } else {
        token
    }
}

impl TransferEngine {
    pub fn new(
        source: Arc<dyn FileSource>,
        destination: Arc<dyn Destination>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            destination,
            staging_dir: staging_dir.into(),
        }
    }

    /// Staging location unique to one job, even for the same source file.
    pub fn staging_path(&self, identifier: &str) -> PathBuf {
        self.staging_dir.join(format!(
            "{}-{}",
            staging_token(identifier),
            Uuid::new_v4().simple()
        ))
    }

    /// Human-readable name of the destination, for status messages.
    pub fn destination_label(&self) -> &'static str {
        self.destination.label()
    }

    /// Stream the full content of `identifier` to `staging_path`.
    ///
    /// Returns the number of bytes written. On error nothing is left at
    /// `staging_path` or its `.part` sibling.
    pub async fn fetch_to_staging(
        &self,
        identifier: &str,
        staging_path: &Path,
    ) -> Result<u64, DownloadError> {
        let start = Instant::now();
        let partial = partial_path(staging_path);

        if let Some(parent) = staging_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let written = match self.download(identifier, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&partial, staging_path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::info!(
            file_id = %identifier,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File staged"
        );

        Ok(written)
    }

    async fn download(&self, identifier: &str, partial: &Path) -> Result<u64, DownloadError> {
        let mut stream = self.source.open(identifier).await?;
        let mut file = fs::File::create(partial).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }

    /// Upload a fully staged file; progress events go to `progress`.
    pub async fn push_to_destination(
        &self,
        staging_path: &Path,
        metadata: &DestinationMetadata,
        session: &Session,
        progress: ProgressSender,
    ) -> TransferResult<RemoteObject> {
        self.destination
            .push(staging_path, metadata, session, progress)
            .await
    }

    /// Remove the staging file and any leftover `.part` sibling.
    ///
    /// Returns whether a staged file existed.
    pub async fn discard(&self, staging_path: &Path) -> std::io::Result<bool> {
        match fs::remove_file(partial_path(staging_path)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        match fs::remove_file(staging_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use driveferry_core::ByteStream;
    use driveferry_storage::{StorageBackend, TransferError};

    struct ChunkSource {
        chunks: Vec<Result<&'static str, &'static str>>,
    }

    #[async_trait]
    impl FileSource for ChunkSource {
        async fn open(&self, identifier: &str) -> Result<ByteStream, SourceError> {
            if identifier == "missing" {
                return Err(SourceError::NotFound(identifier.to_string()));
            }
            let items: Vec<Result<Bytes, SourceError>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(data) => Ok(Bytes::copy_from_slice(data.as_bytes())),
                    Err(msg) => Err(SourceError::Stream(msg.to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    struct NoDestination;

    #[async_trait]
    impl Destination for NoDestination {
        async fn push(
            &self,
            _staging_path: &Path,
            _metadata: &DestinationMetadata,
            _session: &Session,
            _progress: ProgressSender,
        ) -> TransferResult<RemoteObject> {
            Err(TransferError::UploadFailed("unused".to_string()))
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }

        fn label(&self) -> &'static str {
            "nowhere"
        }
    }

    fn engine(chunks: Vec<Result<&'static str, &'static str>>, dir: &Path) -> TransferEngine {
        TransferEngine::new(Arc::new(ChunkSource { chunks }), Arc::new(NoDestination), dir)
    }

    #[tokio::test]
    async fn test_fetch_writes_all_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(vec![Ok("hello "), Ok("world")], dir.path());
        let path = engine.staging_path("BQACAgIAAx0");

        let written = engine.fetch_to_staging("BQACAgIAAx0", &path).await.unwrap();
        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
        assert!(!partial_path(&path).exists());
    }

    #[tokio::test]
    async fn test_interrupted_fetch_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(vec![Ok("hello"), Err("connection reset")], dir.path());
        let path = engine.staging_path("abc");

        let err = engine.fetch_to_staging("abc", &path).await.unwrap_err();
        assert!(matches!(err, DownloadError::Source(SourceError::Stream(_))));
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());
    }

    #[tokio::test]
    async fn test_unknown_file_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(vec![], dir.path());
        let path = engine.staging_path("missing");

        let err = engine.fetch_to_staging("missing", &path).await.unwrap_err();
        assert!(matches!(err, DownloadError::Source(SourceError::NotFound(_))));
    }

    #[test]
    fn test_staging_paths_are_unique_and_safe() {
        let engine = engine(vec![], Path::new("/tmp/staging"));
        let a = engine.staging_path("../../etc/passwd");
        let b = engine.staging_path("../../etc/passwd");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/tmp/staging")));
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("etcpasswd-"));
    }

    #[tokio::test]
    async fn test_discard_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(vec![Ok("x")], dir.path());
        let path = engine.staging_path("abc");

        assert!(!engine.discard(&path).await.unwrap());
        engine.fetch_to_staging("abc", &path).await.unwrap();
        assert!(engine.discard(&path).await.unwrap());
        assert!(!path.exists());
    }
}
