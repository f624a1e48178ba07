use serde::{Deserialize, Serialize};

/// Where and under which name a staged file is created at the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationMetadata {
    pub name: String,
    /// Container (folder) id; `None` means the destination root
    pub parent_id: Option<String>,
    pub mime_type: Option<String>,
}

/// Object reference returned once the destination confirms receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
    pub link: Option<String>,
}

/// Progress event emitted after each acknowledged chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(bytes_sent: u64, total_bytes: u64) -> Self {
        Self {
            bytes_sent,
            total_bytes,
        }
    }

    /// Fraction in `[0, 1]`; an empty transfer counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_sent as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.fraction() * 100.0).floor() as u8
    }
}
