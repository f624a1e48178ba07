#[cfg(feature = "storage-drive")]
use crate::DriveDestination;
#[cfg(feature = "storage-local")]
use crate::LocalDestination;
#[cfg(feature = "storage-drive")]
use crate::RefreshTokenProvider;
use crate::{
    CredentialError, CredentialProvider, Destination, StaticTokenProvider, StorageBackend,
    TransferError, TransferResult,
};
use driveferry_core::Config;
use std::sync::Arc;

/// Create a destination based on configuration
pub async fn create_destination(config: &Config) -> TransferResult<Arc<dyn Destination>> {
    match config.storage_backend {
        #[cfg(feature = "storage-drive")]
        StorageBackend::Drive => {
            let destination = DriveDestination::new(
                config.drive_upload_url.clone(),
                config.chunk_size_bytes(),
                config.upload_max_resumes,
            )?;
            Ok(Arc::new(destination))
        }

        #[cfg(not(feature = "storage-drive"))]
        StorageBackend::Drive => Err(TransferError::ConfigError(
            "Drive backend not available (storage-drive feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                TransferError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let destination = LocalDestination::new(
                base_path,
                config.local_storage_base_url.clone(),
                config.chunk_size_bytes(),
            )
            .await?;
            Ok(Arc::new(destination))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(TransferError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Create the credential provider matching the configured backend
///
/// A static `GOOGLE_ACCESS_TOKEN` wins over the token file. The local backend
/// needs no credentials and gets an anonymous session.
pub fn create_credential_provider(
    config: &Config,
) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
    match config.storage_backend {
        StorageBackend::Drive => {
            match config.google_access_token.as_deref() {
                Some(token) => Ok(Arc::new(StaticTokenProvider::new(token))),
                None => refresh_provider(config),
            }
        }
        StorageBackend::Local => Ok(Arc::new(StaticTokenProvider::anonymous())),
    }
}

#[cfg(feature = "storage-drive")]
fn refresh_provider(config: &Config) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
    let provider = RefreshTokenProvider::new(
        config.google_token_file.clone(),
        config.google_token_uri.clone(),
    )?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "storage-drive"))]
fn refresh_provider(_config: &Config) -> Result<Arc<dyn CredentialProvider>, CredentialError> {
    Err(CredentialError::Unavailable(
        "token refresh requires the storage-drive feature".to_string(),
    ))
}
