//! Driveferry Storage Library
//!
//! This crate provides the destination side of the pipeline: the
//! [`Destination`] trait with its Google Drive and local filesystem
//! implementations, and the [`CredentialProvider`] sessions they upload with.
//!
//! # Transfer contract
//!
//! A destination receives a fully staged local file and streams it out in
//! sequential chunks. After every acknowledged chunk it emits an
//! [`UploadProgress`](driveferry_core::models::UploadProgress) event on the
//! supplied channel. It returns only once the remote side confirms the object,
//! and reports a confirmation that lacks an id or name as
//! [`TransferError::IncompleteConfirmation`], distinct from transport failures.

pub mod credentials;
#[cfg(feature = "storage-drive")]
pub mod drive;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use credentials::{CredentialError, CredentialProvider, Session, StaticTokenProvider};
#[cfg(feature = "storage-drive")]
pub use credentials::RefreshTokenProvider;
#[cfg(feature = "storage-drive")]
pub use drive::DriveDestination;
pub use driveferry_core::StorageBackend;
pub use factory::{create_credential_provider, create_destination};
#[cfg(feature = "storage-local")]
pub use local::LocalDestination;
pub use traits::{Destination, ProgressSender, TransferError, TransferResult};
