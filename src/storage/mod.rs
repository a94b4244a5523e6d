//! Credential storage.
//!
//! OS keychain integration for the OAuth client credentials and refresh
//! token. Keychain calls run on `tokio::task::spawn_blocking`.

mod keychain;

pub use keychain::{CredentialError, CredentialStore, KeychainStore, Result};
