//! Business services layer.
//!
//! Services orchestrate the cleanup pipelines on top of the provider traits.
//! None of them hold a session: the authenticated mailbox is passed into
//! every call.
//!
//! # Architecture
//!
//! ```text
//!        CLI (main.rs)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (Providers, Storage)
//! ```
//!
//! # Services Overview
//!
//! - [`NewsletterService`]: list, group, unsubscribe and delete newsletters
//! - [`DuplicateService`]: collapse repeated automated notifications
//! - [`MailboxService`]: chunked deletion, scan, archive, labels, filters
//! - [`AuthService`]: login, resume and logout against a [`CredentialStore`](crate::storage::CredentialStore)

mod auth_service;
mod duplicate_service;
mod grouping;
mod mailbox_service;
mod newsletter_service;
pub mod unsubscribe;

#[cfg(test)]
pub(crate) mod testing;

pub use auth_service::{AuthError, AuthResult, AuthService};
pub use duplicate_service::DuplicateService;
pub use grouping::{duplicate_key, group_by_sender, partition_by_key, sender_key};
pub use mailbox_service::MailboxService;
pub use newsletter_service::{
    CancelHandle, CleanupError, CleanupReport, CleanupResult, CleanupRun, GroupProcessor,
    NewsletterService,
};
