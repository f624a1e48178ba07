use serde::{Deserialize, Serialize};

/// Source-side metadata shared by every attachment kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// Handle used to download the file
    pub file_id: String,
    /// Stable id used to build default names
    pub file_unique_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
}

/// One file-bearing payload of an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    Document(AttachmentMeta),
    Photo(AttachmentMeta),
    Video(AttachmentMeta),
    Audio(AttachmentMeta),
}

impl Attachment {
    /// Lower rank wins when a message carries several payloads.
    pub fn priority(&self) -> u8 {
        match self {
            Attachment::Document(_) => 0,
            Attachment::Photo(_) => 1,
            Attachment::Video(_) => 2,
            Attachment::Audio(_) => 3,
        }
    }

    /// Pick at most one attachment using the fixed priority order.
    pub fn select(candidates: impl IntoIterator<Item = Attachment>) -> Option<Attachment> {
        candidates.into_iter().min_by_key(Attachment::priority)
    }

    pub fn meta(&self) -> &AttachmentMeta {
        match self {
            Attachment::Document(meta)
            | Attachment::Photo(meta)
            | Attachment::Video(meta)
            | Attachment::Audio(meta) => meta,
        }
    }

    /// Normalize into the uniform descriptor the orchestrator consumes.
    pub fn into_inbound_file(self) -> InboundFile {
        match self {
            Attachment::Document(meta) => {
                let name = meta
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("telegram_doc_{}", meta.file_unique_id));
                InboundFile::from_meta(meta, name, None)
            }
            Attachment::Photo(meta) => {
                // Photos carry no name; they are always delivered as JPEG.
                let name = format!("telegram_photo_{}.jpg", meta.file_unique_id);
                InboundFile::from_meta(meta, name, Some("image/jpeg".to_string()))
            }
            Attachment::Video(meta) => {
                let name = meta
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("telegram_video_{}.mp4", meta.file_unique_id));
                InboundFile::from_meta(meta, name, None)
            }
            Attachment::Audio(meta) => {
                let name = meta
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("telegram_audio_{}.mp3", meta.file_unique_id));
                InboundFile::from_meta(meta, name, None)
            }
        }
    }
}

/// Uniform descriptor of a file offered by the messaging system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundFile {
    pub identifier: String,
    pub display_name: String,
    pub declared_size: u64,
    pub mime_type: Option<String>,
}

impl InboundFile {
    fn from_meta(meta: AttachmentMeta, display_name: String, mime_override: Option<String>) -> Self {
        Self {
            identifier: meta.file_id,
            display_name,
            declared_size: meta.file_size.unwrap_or(0),
            mime_type: mime_override.or(meta.mime_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, name: Option<&str>) -> AttachmentMeta {
        AttachmentMeta {
            file_id: id.to_string(),
            file_unique_id: format!("u{}", id),
            file_name: name.map(String::from),
            file_size: Some(42),
            mime_type: Some("application/octet-stream".to_string()),
        }
    }

    #[test]
    fn test_document_wins_over_other_payloads() {
        let picked = Attachment::select(vec![
            Attachment::Audio(meta("a", None)),
            Attachment::Photo(meta("p", None)),
            Attachment::Document(meta("d", Some("report.pdf"))),
        ])
        .unwrap();
        assert_eq!(picked.meta().file_id, "d");
    }

    #[test]
    fn test_photo_wins_over_video_and_audio() {
        let picked = Attachment::select(vec![
            Attachment::Video(meta("v", None)),
            Attachment::Audio(meta("a", None)),
            Attachment::Photo(meta("p", None)),
        ])
        .unwrap();
        assert!(matches!(picked, Attachment::Photo(_)));
    }

    #[test]
    fn test_no_candidates() {
        assert!(Attachment::select(Vec::new()).is_none());
    }

    #[test]
    fn test_default_names() {
        let file = Attachment::Document(meta("d", None)).into_inbound_file();
        assert_eq!(file.display_name, "telegram_doc_ud");

        let file = Attachment::Photo(meta("p", Some("ignored.png"))).into_inbound_file();
        assert_eq!(file.display_name, "telegram_photo_up.jpg");
        assert_eq!(file.mime_type.as_deref(), Some("image/jpeg"));

        let file = Attachment::Video(meta("v", None)).into_inbound_file();
        assert_eq!(file.display_name, "telegram_video_uv.mp4");

        let file = Attachment::Audio(meta("a", Some("song.flac"))).into_inbound_file();
        assert_eq!(file.display_name, "song.flac");
        assert_eq!(file.identifier, "a");
        assert_eq!(file.declared_size, 42);
    }

    #[test]
    fn test_missing_size_counts_as_zero() {
        let mut m = meta("d", None);
        m.file_size = None;
        assert_eq!(Attachment::Document(m).into_inbound_file().declared_size, 0);
    }
}
