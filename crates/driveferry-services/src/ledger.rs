//! Upload ledger
//!
//! Append-only history of completed uploads, persisted as a single JSON array.
//! Appends are serialized behind one async mutex and every write replaces the
//! file atomically (temp file in the same directory, then rename), so a reader
//! only ever sees the previous or the new complete array.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use driveferry_core::models::LedgerEntry;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Ledger {path} is not a valid history file: {source}")]
    Corrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to write ledger: {0}")]
    Write(String),
}

/// Ordered store of completed uploads
#[async_trait]
pub trait UploadLedger: Send + Sync {
    /// Append one entry; it is durable once this returns `Ok`.
    async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError>;

    /// All entries in append order.
    async fn list_all(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// File-backed ledger
pub struct JsonLedger {
    entries: Mutex<Vec<LedgerEntry>>,
    path: PathBuf,
}

impl JsonLedger {
    /// Open the ledger at `path`, loading existing entries.
    ///
    /// A missing or blank file is an empty ledger. A file that does not parse
    /// is an error: starting fresh would overwrite the history on next append.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
                    path: path.display().to_string(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "Ledger loaded");

        Ok(Self {
            entries: Mutex::new(entries),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Replace `path` with `content` without ever exposing a partial file.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl UploadLedger for JsonLedger {
    async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);

        let written = match serde_json::to_vec_pretty(&*entries) {
            Ok(content) => {
                let path = self.path.clone();
                tokio::task::spawn_blocking(move || write_atomic(&path, &content))
                    .await
                    .map_err(|e| LedgerError::Write(e.to_string()))
                    .and_then(|r| r.map_err(|e| LedgerError::Write(e.to_string())))
            }
            Err(e) => Err(LedgerError::Write(e.to_string())),
        };

        // Memory mirrors the file: drop the entry if it never reached disk.
        if let Err(e) = written {
            entries.pop();
            return Err(e);
        }

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "Ledger entry appended");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(name: &str, owner_id: i64) -> LedgerEntry {
        LedgerEntry {
            name: name.to_string(),
            remote_id: format!("id-{}", name),
            link: Some(format!("https://drive.example/{}", name)),
            owner_id,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonLedger::open(dir.path().join("uploaded_files.json"))
            .await
            .unwrap();
        assert!(ledger.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded_files.json");

        {
            let ledger = JsonLedger::open(&path).await.unwrap();
            ledger.append(entry("a.txt", 1)).await.unwrap();
            ledger.append(entry("b.txt", 2)).await.unwrap();
        }

        let ledger = JsonLedger::open(&path).await.unwrap();
        let mut last = entry("c.txt", 1);
        last.link = None;
        ledger.append(last.clone()).await.unwrap();

        let reopened = JsonLedger::open(&path).await.unwrap();
        let entries = reopened.list_all().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
        assert_eq!(entries.last(), Some(&last));
    }

    #[tokio::test]
    async fn test_reads_existing_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded_files.json");
        std::fs::write(
            &path,
            r#"[{"name": "old.pdf", "id": "1x", "link": "https://drive.example/1x", "telegram_user_id": 5}]"#,
        )
        .unwrap();

        let ledger = JsonLedger::open(&path).await.unwrap();
        let entries = ledger.list_all().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].remote_id, "1x");
        assert_eq!(entries[0].owner_id, 5);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded_files.json");
        std::fs::write(&path, "[{\"name\": \"trunc").unwrap();

        let result = JsonLedger::open(&path).await;
        assert!(matches!(result, Err(LedgerError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uploaded_files.json");
        let ledger = Arc::new(JsonLedger::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.append(entry(&format!("f{}", i), i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.len().await, 20);
        let on_disk: Vec<LedgerEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, ledger.list_all().await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("ledger");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let ledger = JsonLedger {
            entries: Mutex::new(Vec::new()),
            path: path.clone(),
        };
        assert!(ledger.append(entry("a.txt", 1)).await.is_err());
        assert!(ledger.is_empty().await);
    }
}
