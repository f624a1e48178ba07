//! Storage credential sessions
//!
//! The pipeline asks a [`CredentialProvider`] for a [`Session`] once per job.
//! A provider either returns a session that stays valid for at least one
//! transfer or fails with a [`CredentialError`]; it never hands out a token it
//! knows to be expired.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[cfg(feature = "storage-drive")]
pub use refresh::RefreshTokenProvider;

/// Credential acquisition errors; every variant means "unavailable"
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Token file not found: {0}")]
    MissingTokenFile(String),

    #[error("Invalid token file: {0}")]
    InvalidTokenFile(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Credentials unavailable: {0}")]
    Unavailable(String),
}

/// Time-bounded authorization for the destination
#[derive(Clone)]
pub struct Session {
    access_token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplier of storage sessions
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a session valid for at least one transfer.
    async fn acquire_session(&self) -> Result<Session, CredentialError>;
}

/// Provider handing out a fixed token (pre-issued access token, local backend)
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Provider for backends that do not authenticate.
    pub fn anonymous() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenProvider {
    async fn acquire_session(&self) -> Result<Session, CredentialError> {
        Ok(Session::new(self.token.clone(), None))
    }
}

#[cfg(feature = "storage-drive")]
mod refresh {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use reqwest::Client;
    use serde::{Deserialize, Serialize};
    use tokio::sync::Mutex;

    use super::{CredentialError, CredentialProvider, Session};

    /// A handed-out session must outlive one whole transfer; tokens expiring
    /// within this window are refreshed ahead of use.
    const EXPIRY_MARGIN_SECS: i64 = 600;

    /// On-disk authorized-user token, as written by the Google OAuth tooling
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct AuthorizedUser {
        #[serde(default)]
        token: Option<String>,
        refresh_token: String,
        client_id: String,
        client_secret: String,
        #[serde(default)]
        token_uri: Option<String>,
        #[serde(default)]
        expiry: Option<DateTime<Utc>>,
        // Keep unknown keys (scopes, universe_domain, ...) when writing back.
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    }

    impl AuthorizedUser {
        fn usable_token(&self, now: DateTime<Utc>, margin_secs: i64) -> Option<Session> {
            let token = self.token.as_ref().filter(|t| !t.is_empty())?;
            match self.expiry {
                Some(expiry) if expiry <= now + chrono::Duration::seconds(margin_secs) => None,
                expiry => Some(Session::new(token.clone(), expiry)),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    struct RefreshResponse {
        access_token: String,
        #[serde(default)]
        expires_in: Option<i64>,
    }

    /// Provider backed by a refresh token stored in a token file
    ///
    /// The file is read lazily on first use and rewritten after every refresh.
    /// Interactive consent is not performed here: a missing or unreadable file
    /// makes the provider unavailable until an operator supplies one.
    pub struct RefreshTokenProvider {
        client: Client,
        token_file: PathBuf,
        default_token_uri: String,
        cached: Mutex<Option<AuthorizedUser>>,
    }

    impl RefreshTokenProvider {
        pub fn new(
            token_file: impl Into<PathBuf>,
            default_token_uri: impl Into<String>,
        ) -> Result<Self, CredentialError> {
            let client = Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| CredentialError::Unavailable(format!("HTTP client: {}", e)))?;

            Ok(Self {
                client,
                token_file: token_file.into(),
                default_token_uri: default_token_uri.into(),
                cached: Mutex::new(None),
            })
        }

        async fn load(&self) -> Result<AuthorizedUser, CredentialError> {
            let content = match tokio::fs::read_to_string(&self.token_file).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(CredentialError::MissingTokenFile(
                        self.token_file.display().to_string(),
                    ));
                }
                Err(e) => return Err(CredentialError::InvalidTokenFile(e.to_string())),
            };

            serde_json::from_str(&content)
                .map_err(|e| CredentialError::InvalidTokenFile(e.to_string()))
        }

        async fn refresh(&self, user: &mut AuthorizedUser) -> Result<(), CredentialError> {
            let token_uri = user
                .token_uri
                .clone()
                .unwrap_or_else(|| self.default_token_uri.clone());

            tracing::info!("Refreshing storage access token");

            let response = self
                .client
                .post(&token_uri)
                .form(&[
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", user.refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ])
                .send()
                .await
                .map_err(|e| CredentialError::RefreshFailed(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CredentialError::RefreshFailed(format!(
                    "token endpoint returned {}: {}",
                    status, body
                )));
            }

            let refreshed: RefreshResponse = response
                .json()
                .await
                .map_err(|e| CredentialError::RefreshFailed(e.to_string()))?;

            user.token = Some(refreshed.access_token);
            user.expiry = refreshed
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

            self.persist(user).await;
            Ok(())
        }

        /// Write the refreshed token back; failure only costs an extra refresh later.
        async fn persist(&self, user: &AuthorizedUser) {
            let content = match serde_json::to_string_pretty(user) {
                Ok(content) => content,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize refreshed token");
                    return;
                }
            };

            let path = self.token_file.clone();
            let written =
                tokio::task::spawn_blocking(move || write_atomic(&path, content.as_bytes()))
                    .await
                    .map_err(|e| std::io::Error::other(e.to_string()))
                    .and_then(|r| r);

            match written {
                Ok(()) => {
                    tracing::debug!(path = %self.token_file.display(), "Refreshed token saved")
                }
                Err(e) => tracing::error!(
                    error = %e,
                    path = %self.token_file.display(),
                    "Failed to save refreshed token"
                ),
            }
        }
    }

    /// Replace `path` whole: a crash mid-write leaves the previous token file.
    fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    #[async_trait]
    impl CredentialProvider for RefreshTokenProvider {
        async fn acquire_session(&self) -> Result<Session, CredentialError> {
            let mut cached = self.cached.lock().await;

            let mut user = match cached.take() {
                Some(user) => user,
                None => self.load().await?,
            };

            if let Some(session) = user.usable_token(Utc::now(), EXPIRY_MARGIN_SECS) {
                *cached = Some(user);
                return Ok(session);
            }

            let result = self.refresh(&mut user).await;
            // Keep the refresh token cached even when this refresh failed.
            // A fresh token is as long-lived as the endpoint allows.
            let session = result.and_then(|_| {
                user.usable_token(Utc::now(), 0).ok_or_else(|| {
                    CredentialError::RefreshFailed("refreshed token already expired".to_string())
                })
            });
            *cached = Some(user);
            session
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        let session = provider.acquire_session().await.unwrap();
        assert_eq!(session.bearer(), "Bearer abc");
        assert!(session.expires_at().is_none());
    }

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new("secret-token", None);
        assert!(!format!("{:?}", session).contains("secret-token"));
    }
}
