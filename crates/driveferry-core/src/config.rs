//! Configuration module
//!
//! Configuration is read from the process environment (after loading an
//! optional `.env` file). Numeric settings that fail to parse fall back to their
//! defaults; required settings and cross-field rules are checked by
//! [`Config::validate`].

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const BYTES_PER_MB: u64 = 1024 * 1024;
/// Resumable upload chunks must be a multiple of this many bytes.
pub const CHUNK_ALIGNMENT_BYTES: usize = 256 * 1024;

const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const DEFAULT_CHUNK_SIZE_KB: usize = 8192;
const DEFAULT_MAX_RESUMES: u32 = 3;
const DEFAULT_LEDGER_PATH: &str = "uploaded_files.json";
const DEFAULT_HISTORY_DISPLAY_CAP: usize = 25;
const DEFAULT_PROGRESS_STEP_PERCENT: u8 = 20;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    // Messaging
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub poll_timeout_secs: u64,
    // Upload policy
    pub max_file_size_mb: u64,
    pub drive_folder_id: Option<String>,
    // Destination
    pub storage_backend: StorageBackend,
    pub google_token_file: PathBuf,
    pub google_access_token: Option<String>,
    pub google_token_uri: String,
    pub drive_upload_url: String,
    pub upload_chunk_size_kb: usize,
    pub upload_max_resumes: u32,
    pub local_storage_path: Option<PathBuf>,
    pub local_storage_base_url: Option<String>,
    // Local state
    pub ledger_path: PathBuf,
    pub staging_dir: PathBuf,
    // Presentation
    pub history_display_cap: usize,
    pub progress_step_percent: u8,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let storage_backend = match get("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Drive,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_lowercase) {
            Some(ref f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            poll_timeout_secs: get("TELEGRAM_POLL_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            max_file_size_mb: get("MAX_FILE_SIZE_MB")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB),
            drive_folder_id: get("GOOGLE_DRIVE_FOLDER_ID"),
            storage_backend,
            google_token_file: get("GOOGLE_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            google_access_token: get("GOOGLE_ACCESS_TOKEN"),
            google_token_uri: get("GOOGLE_TOKEN_URI")
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            drive_upload_url: get("DRIVE_UPLOAD_URL")
                .unwrap_or_else(|| DEFAULT_DRIVE_UPLOAD_URL.to_string()),
            upload_chunk_size_kb: get("UPLOAD_CHUNK_SIZE_KB")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CHUNK_SIZE_KB),
            upload_max_resumes: get("UPLOAD_MAX_RESUMES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RESUMES),
            local_storage_path: get("LOCAL_STORAGE_PATH").map(PathBuf::from),
            local_storage_base_url: get("LOCAL_STORAGE_BASE_URL"),
            ledger_path: get("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH)),
            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| env::temp_dir().join("driveferry")),
            history_display_cap: get("HISTORY_DISPLAY_CAP")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HISTORY_DISPLAY_CAP),
            progress_step_percent: get("PROGRESS_STEP_PERCENT")
                .and_then(|s| s.parse().ok())
                .filter(|p: &u8| (1..=100).contains(p))
                .unwrap_or(DEFAULT_PROGRESS_STEP_PERCENT),
            log_format,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.telegram_bot_token.is_empty() {
            return Err(anyhow::anyhow!(
                "TELEGRAM_BOT_TOKEN must be set for the bot to start"
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        if self.history_display_cap == 0 {
            return Err(anyhow::anyhow!("HISTORY_DISPLAY_CAP must be greater than zero"));
        }

        let chunk = self.chunk_size_bytes();
        if chunk == 0 || chunk % CHUNK_ALIGNMENT_BYTES != 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_CHUNK_SIZE_KB must be a non-zero multiple of 256"
            ));
        }

        // Missing Drive credentials are not fatal here: each job reports them.
        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        Ok(())
    }

    /// True when the Drive backend has neither a static token nor a token file.
    pub fn drive_credentials_missing(&self) -> bool {
        self.storage_backend == StorageBackend::Drive
            && self.google_access_token.is_none()
            && !self.google_token_file.exists()
    }

    /// Upload size limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    pub fn chunk_size_bytes(&self) -> usize {
        self.upload_chunk_size_kb.saturating_mul(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.max_file_size_mb, 100);
        assert_eq!(config.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.storage_backend, StorageBackend::Drive);
        assert_eq!(config.history_display_cap, 25);
        assert_eq!(config.progress_step_percent, 20);
        assert_eq!(config.chunk_size_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.ledger_path, PathBuf::from("uploaded_files.json"));
        assert!(config.drive_folder_id.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_size_falls_back_to_default() {
        let config = config_from(&[("MAX_FILE_SIZE_MB", "lots")]);
        assert_eq!(config.max_file_size_mb, 100);
    }

    #[test]
    fn test_empty_folder_id_is_unset() {
        let config = config_from(&[("GOOGLE_DRIVE_FOLDER_ID", "  ")]);
        assert!(config.drive_folder_id.is_none());

        let config = config_from(&[("GOOGLE_DRIVE_FOLDER_ID", "folder123")]);
        assert_eq!(config.drive_folder_id.as_deref(), Some("folder123"));
    }

    #[test]
    fn test_invalid_backend_is_an_error() {
        let result = Config::from_lookup(|key| {
            (key == "STORAGE_BACKEND").then(|| "ftp".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_requires_token() {
        let config = config_from(&[("GOOGLE_ACCESS_TOKEN", "ya29.token")]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_validate_rejects_unaligned_chunk_size() {
        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
            ("UPLOAD_CHUNK_SIZE_KB", "300"),
        ]);
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
            ("UPLOAD_CHUNK_SIZE_KB", "512"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_local_backend_needs_path() {
        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("STORAGE_BACKEND", "local"),
        ]);
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/driveferry-out"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_drive_credentials_do_not_fail_validation() {
        let config = config_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("GOOGLE_TOKEN_FILE", "/nonexistent/driveferry/token.json"),
        ]);
        assert!(config.validate().is_ok());
        assert!(config.drive_credentials_missing());

        let config = config_from(&[
            ("GOOGLE_TOKEN_FILE", "/nonexistent/driveferry/token.json"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
        ]);
        assert!(!config.drive_credentials_missing());
    }

    #[test]
    fn test_progress_step_out_of_range_uses_default() {
        let config = config_from(&[("PROGRESS_STEP_PERCENT", "0")]);
        assert_eq!(config.progress_step_percent, 20);
        let config = config_from(&[("PROGRESS_STEP_PERCENT", "25")]);
        assert_eq!(config.progress_step_percent, 25);
    }

    #[test]
    fn test_json_log_format() {
        let config = config_from(&[("LOG_FORMAT", "JSON")]);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
