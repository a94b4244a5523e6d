//! Authentication lifecycle for the Gmail session.
//!
//! Credentials (OAuth client id/secret plus refresh token) live in a
//! [`CredentialStore`]; an authenticated session is a [`GmailClient`] value.
//! Holding a client is the proof of login, so no global "is logged in" flag
//! exists anywhere.

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ApiSettings;
use crate::providers::email::{GmailClient, GmailCredentials, ProviderError};
use crate::storage::{CredentialError, CredentialStore};

/// Errors from the authentication lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not logged in, run `mailsweep login` first")]
    NotLoggedIn,

    #[error("stored credentials are unreadable: {0}")]
    CorruptCredentials(String),

    #[error("credential store error: {0}")]
    CredentialStore(#[from] CredentialError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result type for authentication operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Creates and ends authenticated sessions for one account.
pub struct AuthService<C: CredentialStore> {
    store: C,
    api: ApiSettings,
    account: String,
}

impl<C: CredentialStore> AuthService<C> {
    /// Default account name.
    pub const DEFAULT_ACCOUNT: &'static str = "default";

    pub fn new(store: C, api: ApiSettings) -> Self {
        Self::for_account(store, api, Self::DEFAULT_ACCOUNT)
    }

    pub fn for_account(store: C, api: ApiSettings, account: impl Into<String>) -> Self {
        Self {
            store,
            api,
            account: account.into(),
        }
    }

    fn credentials_key(&self) -> String {
        format!("gmail.credentials.{}", self.account)
    }

    /// Authenticates with fresh credentials and persists them on success.
    ///
    /// Nothing is stored if authentication fails.
    pub async fn login(&self, credentials: &GmailCredentials) -> AuthResult<GmailClient> {
        let client = GmailClient::authenticate(credentials, &self.api).await?;

        let json = serde_json::to_string(credentials)
            .map_err(|e| AuthError::CorruptCredentials(e.to_string()))?;
        self.store.store(&self.credentials_key(), &json).await?;

        info!(account = %self.account, "Logged in");
        Ok(client)
    }

    /// Authenticates from previously stored credentials.
    pub async fn resume(&self) -> AuthResult<GmailClient> {
        let credentials = self.stored_credentials().await?.ok_or(AuthError::NotLoggedIn)?;
        let client = GmailClient::authenticate(&credentials, &self.api).await?;
        Ok(client)
    }

    /// Whether credentials are stored for this account.
    pub async fn is_authenticated(&self) -> AuthResult<bool> {
        Ok(self.stored_credentials().await?.is_some())
    }

    /// Forgets stored credentials and ends the given session, if any.
    pub async fn logout(&self, session: Option<GmailClient>) -> AuthResult<()> {
        drop(session);
        self.store.delete(&self.credentials_key()).await?;
        info!(account = %self.account, "Logged out");
        Ok(())
    }

    async fn stored_credentials(&self) -> AuthResult<Option<GmailCredentials>> {
        let Some(json) = self.store.retrieve(&self.credentials_key()).await? else {
            return Ok(None);
        };

        serde_json::from_str(&json).map(Some).map_err(|e| {
            warn!(account = %self.account, error = %e, "Stored credentials failed to parse");
            AuthError::CorruptCredentials(e.to_string())
        })
    }
}
