//! Bot API HTTP client
//!
//! Method calls go to `{api_url}/bot{token}/{method}` and file downloads to
//! `{api_url}/file/bot{token}/{file_path}`. Both URLs embed the token, so
//! transport errors are stripped of their URL before they are surfaced.

use std::time::Duration;

use async_trait::async_trait;
use driveferry_core::{
    ByteStream, FileSource, Notifier, NotifyError, SourceError, StatusMessage,
};
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{ApiResponse, Message, RemoteFile, Update};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Plain method calls finish well within this; long polls add their own timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {description}")]
    Api { status: u16, description: String },

    #[error("API returned ok without a result")]
    EmptyResult,
}

impl TelegramError {
    fn http(e: reqwest::Error) -> Self {
        TelegramError::Http(e.without_url())
    }

    /// True when an edit was rejected only because the text did not change.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { description, .. }
            if description.contains("message is not modified"))
    }
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetFile<'a> {
    file_id: &'a str,
}

/// Telegram Bot API client
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, TelegramError> {
        // No overall timeout: file downloads may legitimately run for minutes.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(TelegramError::http)?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_url, self.token, file_path)
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(TelegramError::http)?;

        let status = response.status();
        let text = response.text().await.map_err(TelegramError::http)?;

        // Error responses still carry the JSON envelope with a description.
        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) => {
                return Err(TelegramError::Api {
                    status: status.as_u16(),
                    description: text,
                });
            }
        };

        if !envelope.ok || !status.is_success() {
            return Err(TelegramError::Api {
                status: envelope.error_code.unwrap_or(status.as_u16()),
                description: envelope
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        envelope.result.ok_or(TelegramError::EmptyResult)
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT,
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let body = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };
        self.call("sendMessage", &body, REQUEST_TIMEOUT).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        let body = EditMessageText {
            chat_id,
            message_id,
            text,
            disable_web_page_preview: true,
        };
        // Result is the edited Message (or `true` for inline messages); only success matters.
        let _: serde_json::Value = self.call("editMessageText", &body, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile, TelegramError> {
        self.call("getFile", &GetFile { file_id }, REQUEST_TIMEOUT)
            .await
    }
}

#[async_trait]
impl FileSource for TelegramClient {
    async fn open(&self, identifier: &str) -> Result<ByteStream, SourceError> {
        let file = self.get_file(identifier).await.map_err(|e| match e {
            TelegramError::Api { status: 400, .. } => SourceError::NotFound(e.to_string()),
            e => SourceError::Request(e.to_string()),
        })?;

        let file_path = file.file_path.ok_or_else(|| {
            SourceError::NotFound(format!("no download path for {}", identifier))
        })?;

        let response = self
            .http
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| SourceError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status.as_u16() {
                404 => SourceError::NotFound(format!("file download returned {}", status)),
                _ => SourceError::Request(format!("file download returned {}", status)),
            });
        }

        tracing::debug!(
            file_id = %identifier,
            size_bytes = file.file_size.unwrap_or(0),
            "Streaming file from Telegram"
        );

        let stream = response
            .bytes_stream()
            .map_err(|e| SourceError::Stream(e.without_url().to_string()));
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, chat_id: i64, text: &str) -> Result<StatusMessage, NotifyError> {
        let message = self
            .send_message(chat_id, text)
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        Ok(StatusMessage {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit(&self, message: &StatusMessage, text: &str) -> Result<(), NotifyError> {
        match self
            .edit_message_text(message.chat_id, message.message_id, text)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(NotifyError::Edit(e.to_string())),
        }
    }
}
