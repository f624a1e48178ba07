//! Error types module
//!
//! `JobError` is the failure taxonomy of a single upload job. Every variant
//! describes itself through [`ErrorMetadata`] so the orchestrator can decide
//! whether the job is over, how loudly to log it, and what the user is told.
//! Internal causes stay in the `Display` output and never reach
//! `client_message`.

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected outcomes such as a rejected oversize file
    Info,
    /// Recovered problems that did not change the job outcome
    Warn,
    /// Failures that ended the job
    Error,
}

/// Metadata describing how an error is presented and handled
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "SIZE_LIMIT_EXCEEDED")
    fn error_code(&self) -> &'static str;

    /// Whether this error terminates the job
    fn is_fatal(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// User-facing message; never contains causes, paths or tokens
    fn client_message(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobError {
    #[error("File '{file_name}' is {size_bytes} bytes, limit is {limit_bytes} bytes")]
    SizeLimitExceeded {
        file_name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("Storage credentials unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload accepted but confirmation incomplete: {0}")]
    IncompleteConfirmation(String),

    #[error("Ledger write failed: {0}")]
    LedgerWriteFailed(String),

    #[error("Notification failed: {0}")]
    NotifyFailed(String),

    #[error("Staging cleanup failed: {0}")]
    CleanupFailed(String),
}

impl JobError {
    /// True for failures raised by the destination side of the transfer.
    pub fn is_upload_failure(&self) -> bool {
        matches!(
            self,
            JobError::UploadFailed(_) | JobError::IncompleteConfirmation(_)
        )
    }
}

impl ErrorMetadata for JobError {
    fn error_code(&self) -> &'static str {
        match self {
            JobError::SizeLimitExceeded { .. } => "SIZE_LIMIT_EXCEEDED",
            JobError::AuthUnavailable(_) => "AUTH_UNAVAILABLE",
            JobError::DownloadFailed(_) => "DOWNLOAD_FAILED",
            JobError::UploadFailed(_) => "UPLOAD_FAILED",
            JobError::IncompleteConfirmation(_) => "INCOMPLETE_CONFIRMATION",
            JobError::LedgerWriteFailed(_) => "LEDGER_WRITE_FAILED",
            JobError::NotifyFailed(_) => "NOTIFY_FAILED",
            JobError::CleanupFailed(_) => "CLEANUP_FAILED",
        }
    }

    fn is_fatal(&self) -> bool {
        !matches!(
            self,
            JobError::LedgerWriteFailed(_) | JobError::NotifyFailed(_) | JobError::CleanupFailed(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            JobError::SizeLimitExceeded { .. } => LogLevel::Info,
            JobError::LedgerWriteFailed(_)
            | JobError::NotifyFailed(_)
            | JobError::CleanupFailed(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    fn client_message(&self) -> String {
        match self {
            JobError::SizeLimitExceeded {
                file_name,
                size_bytes,
                limit_bytes,
            } => format!(
                "❌ File Too Large!\n\nThe file '{}' is {:.2} MB. The maximum allowed size is {} MB.",
                file_name,
                *size_bytes as f64 / BYTES_PER_MB,
                limit_bytes / (1024 * 1024)
            ),
            JobError::AuthUnavailable(_) => "⚠️ Could not connect to cloud storage. \
                Authentication might be needed or configuration is wrong. \
                Please check the bot logs or contact the administrator."
                .to_string(),
            JobError::DownloadFailed(_) => {
                "❌ Error downloading file from Telegram. Please try sending it again.".to_string()
            }
            JobError::UploadFailed(_) => {
                "❌ Upload to cloud storage failed. Please try again later.".to_string()
            }
            JobError::IncompleteConfirmation(_) => {
                "❌ Upload completed but failed to get file details from cloud storage."
                    .to_string()
            }
            // Non-fatal errors are never shown; the job outcome is reported instead.
            JobError::LedgerWriteFailed(_)
            | JobError::NotifyFailed(_)
            | JobError::CleanupFailed(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_message_mentions_both_sizes() {
        let err = JobError::SizeLimitExceeded {
            file_name: "movie.mkv".to_string(),
            size_bytes: 150 * 1024 * 1024,
            limit_bytes: 100 * 1024 * 1024,
        };
        let msg = err.client_message();
        assert!(msg.contains("150.00 MB"));
        assert!(msg.contains("100 MB"));
        assert!(msg.contains("movie.mkv"));
        assert_eq!(err.error_code(), "SIZE_LIMIT_EXCEEDED");
        assert!(err.is_fatal());
        assert_eq!(err.log_level(), LogLevel::Info);
    }

    #[test]
    fn test_client_message_hides_cause() {
        let err = JobError::DownloadFailed("open /var/tmp/driveferry/abc.part: denied".to_string());
        assert!(!err.client_message().contains("/var/tmp"));
        assert!(err.to_string().contains("/var/tmp"));

        let err = JobError::UploadFailed("HTTP 500 from https://upload.example".to_string());
        assert!(!err.client_message().contains("500"));
    }

    #[test]
    fn test_non_fatal_errors() {
        for err in [
            JobError::LedgerWriteFailed("disk full".to_string()),
            JobError::NotifyFailed("timeout".to_string()),
            JobError::CleanupFailed("busy".to_string()),
        ] {
            assert!(!err.is_fatal());
            assert_eq!(err.log_level(), LogLevel::Warn);
        }
    }

    #[test]
    fn test_upload_failure_family() {
        assert!(JobError::UploadFailed("x".into()).is_upload_failure());
        assert!(JobError::IncompleteConfirmation("x".into()).is_upload_failure());
        assert!(!JobError::DownloadFailed("x".into()).is_upload_failure());
        assert_ne!(
            JobError::UploadFailed("x".into()).error_code(),
            JobError::IncompleteConfirmation("x".into()).error_code()
        );
    }
}
