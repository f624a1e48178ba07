use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Destination backend types
///
/// Defined in core because configuration selects the backend before any
/// storage crate is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Drive,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drive" | "gdrive" | "google-drive" => Ok(StorageBackend::Drive),
            "local" => Ok(StorageBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Drive => write!(f, "drive"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}
