//! Messaging ports
//!
//! The upload pipeline needs two things from the messaging provider: the bytes
//! of a file by identifier, and a status message it can post and later edit in
//! place. Adapters (the Telegram client, test fakes) implement these traits.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

/// Errors raised while fetching a file from the messaging provider
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Source request failed: {0}")]
    Request(String),

    #[error("Stream interrupted: {0}")]
    Stream(String),
}

/// Errors raised while posting or editing a status message
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to edit message: {0}")]
    Edit(String),
}

/// Stream of file content chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, SourceError>> + Send>>;

/// Handle to a posted status message that can be edited later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Source of file content identified by an opaque handle
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Open the full content of `identifier` as a stream.
    async fn open(&self, identifier: &str) -> Result<ByteStream, SourceError>;
}

/// User-visible status channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a new message into `chat_id`.
    async fn send(&self, chat_id: i64, text: &str) -> Result<StatusMessage, NotifyError>;

    /// Replace the text of a previously posted message.
    async fn edit(&self, message: &StatusMessage, text: &str) -> Result<(), NotifyError>;
}
