//! Driveferry Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and
//! messaging ports shared by every Driveferry component.

pub mod config;
pub mod error;
pub mod messaging;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorMetadata, JobError, LogLevel};
pub use messaging::{ByteStream, FileSource, Notifier, NotifyError, SourceError, StatusMessage};
pub use storage_types::StorageBackend;
