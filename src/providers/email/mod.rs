//! Mailbox provider implementations.
//!
//! This module contains the [`MailboxApi`] trait and its Gmail REST
//! implementation, [`GmailClient`].
//!
//! # Architecture
//!
//! Services never hold a global client. They receive a `&dyn MailboxApi`
//! (in practice an authenticated [`GmailClient`]) for the duration of each
//! call, which keeps them testable against in-memory fakes.
//!
//! # Example
//!
//! ```ignore
//! use mailsweep::providers::email::{GmailClient, GmailCredentials, MailboxApi, Pagination};
//!
//! async fn count_spam(credentials: &GmailCredentials, settings: &ApiSettings) -> u64 {
//!     let client = GmailClient::authenticate(credentials, settings)
//!         .await
//!         .expect("failed to authenticate");
//!     client
//!         .list("in:spam", &Pagination::with_limit(1))
//!         .await
//!         .map(|page| page.result_size_estimate)
//!         .unwrap_or(0)
//! }
//! ```

mod gmail;
mod traits;

pub use gmail::{GmailClient, GmailCredentials};
pub use traits::{FullMessage, ListPage, MailboxApi, Pagination, ProviderError, Result};
