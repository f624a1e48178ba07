//! Bot API payload types
//!
//! Only the fields the relay reads are modelled; everything else in the
//! payloads is ignored by serde.

use driveferry_core::models::{Attachment, AttachmentMeta};
use serde::Deserialize;

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub document: Option<FileMeta>,
    /// Sizes of one photo, smallest first
    #[serde(default)]
    pub photo: Option<Vec<FileMeta>>,
    #[serde(default)]
    pub video: Option<FileMeta>,
    #[serde(default)]
    pub audio: Option<FileMeta>,
}

/// Common shape of document, photo size, video and audio objects
#[derive(Debug, Clone, Deserialize)]
pub struct FileMeta {
    pub file_id: String,
    pub file_unique_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl From<FileMeta> for AttachmentMeta {
    fn from(meta: FileMeta) -> Self {
        AttachmentMeta {
            file_id: meta.file_id,
            file_unique_id: meta.file_unique_id,
            file_name: meta.file_name,
            file_size: meta.file_size,
            mime_type: meta.mime_type,
        }
    }
}

/// Result of `getFile`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteFile {
    #[allow(dead_code)]
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// A bot command such as `/myfiles` or `/start@driveferry_bot now`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

impl Message {
    /// The single attachment this message carries, by document > photo > video > audio.
    ///
    /// For photos the largest size (the last entry) is used.
    pub fn attachment(&self) -> Option<Attachment> {
        let mut candidates = Vec::new();
        if let Some(doc) = &self.document {
            candidates.push(Attachment::Document(doc.clone().into()));
        }
        if let Some(largest) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            candidates.push(Attachment::Photo(largest.clone().into()));
        }
        if let Some(video) = &self.video {
            candidates.push(Attachment::Video(video.clone().into()));
        }
        if let Some(audio) = &self.audio {
            candidates.push(Attachment::Audio(audio.clone().into()));
        }
        Attachment::select(candidates)
    }

    /// Parse the text as a command; the `@botname` suffix is dropped.
    pub fn command(&self) -> Option<Command> {
        let text = self.text.as_deref()?.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        Some(Command {
            name: name.to_lowercase(),
            args: args.to_string(),
        })
    }

    /// Id of the sender, falling back to the chat for anonymous posts.
    pub fn sender_id(&self) -> i64 {
        self.from.as_ref().map(|u| u.id).unwrap_or(self.chat.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_largest_photo_is_selected() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 10},
            "photo": [
                {"file_id": "small", "file_unique_id": "s", "file_size": 100},
                {"file_id": "large", "file_unique_id": "l", "file_size": 9000}
            ]
        }));

        let file = msg.attachment().unwrap().into_inbound_file();
        assert_eq!(file.identifier, "large");
        assert_eq!(file.display_name, "telegram_photo_l.jpg");
        assert_eq!(file.declared_size, 9000);
    }

    #[test]
    fn test_document_beats_photo() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 10},
            "document": {"file_id": "doc", "file_unique_id": "d", "file_name": "a.pdf"},
            "photo": [{"file_id": "p", "file_unique_id": "p"}]
        }));

        assert!(matches!(msg.attachment(), Some(Attachment::Document(_))));
    }

    #[test]
    fn test_text_message_has_no_attachment() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 10},
            "from": {"id": 77, "first_name": "Ada"},
            "text": "hello"
        }));

        assert!(msg.attachment().is_none());
        assert!(msg.command().is_none());
        assert_eq!(msg.sender_id(), 77);
    }

    #[test]
    fn test_command_parsing() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 10},
            "text": "/MyFiles@driveferry_bot  extra"
        }));

        assert_eq!(
            msg.command(),
            Some(Command {
                name: "myfiles".to_string(),
                args: "extra".to_string()
            })
        );
        assert_eq!(msg.sender_id(), 10);
    }
}
