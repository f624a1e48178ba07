//! Google Drive destination using the resumable upload protocol
//!
//! An upload session is opened with the file metadata, then content is sent in
//! fixed-size chunks with `Content-Range` headers. The server answers `308`
//! with a `Range` header while it expects more data and `200`/`201` with the
//! file resource once the last byte is stored. After a transient failure
//! (network error, `5xx`, `429`) the session is queried with
//! `Content-Range: bytes */total` and the upload resumes from the last byte the
//! server acknowledged.

use std::io::SeekFrom;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use driveferry_core::models::{DestinationMetadata, RemoteObject, UploadProgress};
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::credentials::Session;
use crate::traits::{Destination, ProgressSender, TransferError, TransferResult};
use crate::StorageBackend;

/// Fields requested from the files resource on completion.
const RESPONSE_FIELDS: &str = "id,name,webViewLink";
const RESUME_INCOMPLETE: u16 = 308;

#[derive(Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<&'a str>>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

/// Outcome of sending one chunk or querying the session
enum ChunkOutcome {
    /// Server stored everything up to (excluding) this offset
    Incomplete(u64),
    Complete(Response),
    /// Worth resuming: network error, 5xx or 429
    Transient(String),
}

/// Google Drive destination
#[derive(Clone)]
pub struct DriveDestination {
    client: Client,
    upload_url: String,
    chunk_size: usize,
    max_resumes: u32,
}

impl DriveDestination {
    /// Create a new DriveDestination
    ///
    /// # Arguments
    /// * `upload_url` - Resumable endpoint (e.g. "https://www.googleapis.com/upload/drive/v3/files")
    /// * `chunk_size` - Bytes per chunk; must be a multiple of 256 KiB
    /// * `max_resumes` - Resume attempts allowed per transfer
    pub fn new(
        upload_url: impl Into<String>,
        chunk_size: usize,
        max_resumes: u32,
    ) -> TransferResult<Self> {
        if chunk_size == 0 {
            return Err(TransferError::ConfigError(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        // 308 is the protocol's "resume incomplete", not a redirect.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransferError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upload_url: upload_url.into(),
            chunk_size,
            max_resumes,
        })
    }

    /// Open a resumable session and return its URI.
    async fn initiate(
        &self,
        metadata: &DestinationMetadata,
        session: &Session,
        total: u64,
    ) -> TransferResult<String> {
        let body = FileMetadata {
            name: &metadata.name,
            parents: metadata.parent_id.as_deref().map(|p| vec![p]),
            mime_type: metadata.mime_type.as_deref(),
        };

        let mut request = self
            .client
            .post(&self.upload_url)
            .query(&[("uploadType", "resumable"), ("fields", RESPONSE_FIELDS)])
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header("X-Upload-Content-Length", total.to_string())
            .json(&body);

        if let Some(mime) = metadata.mime_type.as_deref() {
            request = request.header("X-Upload-Content-Type", mime);
        }

        let response = request.send().await.map_err(|e| {
            TransferError::UploadFailed(format!("Failed to open upload session: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransferError::UploadFailed(format!(
                "Upload session rejected with status {}: {}",
                status, text
            )));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                TransferError::UploadFailed("Upload session response had no Location".to_string())
            })
    }

    async fn send_chunk(
        &self,
        session_uri: &str,
        session: &Session,
        offset: u64,
        data: Vec<u8>,
        total: u64,
    ) -> TransferResult<ChunkOutcome> {
        let range = if data.is_empty() {
            format!("bytes */{}", total)
        } else {
            format!("bytes {}-{}/{}", offset, offset + data.len() as u64 - 1, total)
        };

        let result = self
            .client
            .put(session_uri)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header(CONTENT_RANGE, range)
            .body(data)
            .send()
            .await;

        classify(result).await
    }

    /// Ask the server how much of the content it already holds.
    async fn query_status(
        &self,
        session_uri: &str,
        session: &Session,
        total: u64,
    ) -> TransferResult<ChunkOutcome> {
        let result = self
            .client
            .put(session_uri)
            .header(reqwest::header::AUTHORIZATION, session.bearer())
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .body(Vec::new())
            .send()
            .await;

        classify(result).await
    }
}

/// Map a chunk response onto the protocol outcome.
async fn classify(result: reqwest::Result<Response>) -> TransferResult<ChunkOutcome> {
    let response = match result {
        Ok(response) => response,
        Err(e) => return Ok(ChunkOutcome::Transient(e.to_string())),
    };

    let status = response.status();
    if status.as_u16() == RESUME_INCOMPLETE {
        let next = response
            .headers()
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_range_end)
            .map(|last| last + 1)
            .unwrap_or(0);
        return Ok(ChunkOutcome::Incomplete(next));
    }

    if status == StatusCode::OK || status == StatusCode::CREATED {
        return Ok(ChunkOutcome::Complete(response));
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Ok(ChunkOutcome::Transient(format!("server returned {}", status)));
    }

    let text = response.text().await.unwrap_or_default();
    Err(TransferError::UploadFailed(format!(
        "Chunk rejected with status {}: {}",
        status, text
    )))
}

/// Parse the inclusive end of a `Range: bytes=0-N` header.
fn parse_range_end(value: &str) -> Option<u64> {
    value
        .trim()
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}

/// Turn the final response into a confirmed object.
async fn confirm(response: Response) -> TransferResult<RemoteObject> {
    let text = response.text().await.map_err(|e| {
        TransferError::IncompleteConfirmation(format!("Failed to read confirmation: {}", e))
    })?;

    let resource: FileResource = serde_json::from_str(&text).map_err(|e| {
        TransferError::IncompleteConfirmation(format!("Unparseable confirmation: {}", e))
    })?;

    match (resource.id, resource.name) {
        (Some(id), Some(name)) if !id.is_empty() => Ok(RemoteObject {
            id,
            name,
            link: resource.web_view_link.filter(|l| !l.is_empty()),
        }),
        _ => Err(TransferError::IncompleteConfirmation(format!(
            "Confirmation lacks id or name: {}",
            text
        ))),
    }
}

#[async_trait]
impl Destination for DriveDestination {
    async fn push(
        &self,
        staging_path: &Path,
        metadata: &DestinationMetadata,
        session: &Session,
        progress: ProgressSender,
    ) -> TransferResult<RemoteObject> {
        let start = Instant::now();
        let mut file = fs::File::open(staging_path).await?;
        let total = file.metadata().await?.len();

        let session_uri = self.initiate(metadata, session, total).await?;
        tracing::debug!(name = %metadata.name, total_bytes = total, "Upload session opened");

        let mut offset: u64 = 0;
        let mut resumes: u32 = 0;
        let mut interrupted = false;

        loop {
            let outcome = if interrupted {
                self.query_status(&session_uri, session, total).await?
            } else {
                let remaining = total.saturating_sub(offset);
                let len = remaining.min(self.chunk_size as u64) as usize;
                let mut chunk = vec![0u8; len];
                file.seek(SeekFrom::Start(offset)).await?;
                file.read_exact(&mut chunk).await?;

                self.send_chunk(&session_uri, session, offset, chunk, total)
                    .await?
            };

            match outcome {
                ChunkOutcome::Transient(reason) => {
                    resumes += 1;
                    if resumes > self.max_resumes {
                        return Err(TransferError::UploadFailed(format!(
                            "Giving up after {} resume attempts: {}",
                            self.max_resumes, reason
                        )));
                    }
                    tracing::warn!(
                        name = %metadata.name,
                        offset,
                        attempt = resumes,
                        reason = %reason,
                        "Chunk interrupted, querying upload session"
                    );
                    interrupted = true;
                }
                ChunkOutcome::Complete(response) => {
                    let object = confirm(response).await?;
                    let _ = progress.send(UploadProgress::new(total, total));

                    tracing::info!(
                        name = %object.name,
                        remote_id = %object.id,
                        size_bytes = total,
                        resumes,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Drive upload successful"
                    );
                    return Ok(object);
                }
                ChunkOutcome::Incomplete(next) => {
                    if next > total {
                        return Err(TransferError::UploadFailed(format!(
                            "Server acknowledged {} bytes of {}",
                            next, total
                        )));
                    }
                    if !interrupted && next <= offset {
                        return Err(TransferError::UploadFailed(format!(
                            "Server stopped acknowledging data at byte {}",
                            offset
                        )));
                    }
                    interrupted = false;
                    offset = next;
                    let _ = progress.send(UploadProgress::new(offset, total));
                }
            }
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Drive
    }

    fn label(&self) -> &'static str {
        "Google Drive"
    }
}
