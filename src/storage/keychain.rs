//! Secret storage for the Gmail credentials.
//!
//! [`CredentialStore`] is the seam the auth service depends on;
//! [`KeychainStore`] backs it with the OS keychain through `keyring`.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a credential store.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("keychain task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for credential store operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Persists secrets between runs, keyed by name.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores a secret, replacing any previous one.
    async fn store(&self, key: &str, secret: &str) -> Result<()>;

    /// Returns the stored secret, or `None` if absent.
    async fn retrieve(&self, key: &str) -> Result<Option<String>>;

    /// Removes a secret. Removing an absent secret succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Credential store backed by the OS keychain.
///
/// Every secret is an entry under one service name. Keychain calls block,
/// so each runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    /// Service name used for mailsweep entries.
    pub const SERVICE: &'static str = "io.mailsweep.app";

    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&keyring::Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_owned();

        let outcome = tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key)?;
            op(&entry)
        })
        .await?;
        Ok(outcome?)
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new(Self::SERVICE)
    }
}

#[async_trait]
impl CredentialStore for KeychainStore {
    async fn store(&self, key: &str, secret: &str) -> Result<()> {
        let secret = secret.to_owned();
        self.with_entry(key, move |entry| entry.set_password(&secret))
            .await
    }

    async fn retrieve(&self, key: &str) -> Result<Option<String>> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await
    }
}
