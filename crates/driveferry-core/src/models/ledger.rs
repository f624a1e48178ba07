use serde::{Deserialize, Serialize};

use super::RemoteObject;

/// Durable record of one completed upload
///
/// Field names on disk follow the long-standing `uploaded_files.json` layout
/// so existing history files load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub name: String,
    #[serde(rename = "id")]
    pub remote_id: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(rename = "telegram_user_id")]
    pub owner_id: i64,
}

impl LedgerEntry {
    /// Build an entry from a confirmed destination object.
    pub fn from_remote(object: &RemoteObject, owner_id: i64) -> Self {
        Self {
            name: object.name.clone(),
            remote_id: object.id.clone(),
            link: object.link.clone(),
            owner_id,
        }
    }
}
