//! Mailbox provider trait definition.
//!
//! This module defines the [`MailboxApi`] trait, the set of capabilities the
//! cleanup services need from a hosted mailbox: paginated search, header and
//! full-message fetches, bulk deletion and label/filter management.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AttachmentPart, Filter, FilterAction, FilterCriteria, Header, HeaderField, Label, LabelColor,
    LabelId, MailboxProfile, MessageId, MessageRef,
};

/// Result type alias for mailbox provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during mailbox provider operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying, if known.
        retry_after_secs: Option<u64>,
    },

    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource being created already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Invalid request or parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rejected the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider answered with something we could not interpret.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Whether the error invalidates the whole session rather than one item.
    ///
    /// Lost authentication and unexpected response shapes abort a run; every
    /// other error is scoped to the request that produced it.
    pub fn is_catastrophic(&self) -> bool {
        matches!(
            self,
            ProviderError::Authentication(_) | ProviderError::Internal(_)
        )
    }
}

/// Pagination parameters for list operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of items to return.
    pub limit: Option<u32>,
    /// Opaque cursor for the next page of results.
    pub page_token: Option<String>,
}

impl Pagination {
    /// Creates a new pagination with the specified limit.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            page_token: None,
        }
    }

    /// Returns the same page size positioned at the given cursor.
    pub fn at(&self, token: impl Into<String>) -> Self {
        Self {
            limit: self.limit,
            page_token: Some(token.into()),
        }
    }
}

/// One page of a message search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Matching messages on this page.
    pub messages: Vec<MessageRef>,
    /// Cursor for the next page, if any.
    pub next_page_token: Option<String>,
    /// Provider's estimate of the total number of matches.
    pub result_size_estimate: u64,
}

/// A message fetched in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullMessage {
    pub headers: Vec<Header>,
    /// Decoded `text/plain` body.
    pub body_text: Option<String>,
    /// Decoded `text/html` body.
    pub body_html: Option<String>,
    /// Parts carrying a filename and non-empty body.
    pub attachments: Vec<AttachmentPart>,
}

impl FullMessage {
    /// The body to scan for links: HTML when present, plain text otherwise.
    pub fn scan_body(&self) -> Option<&str> {
        self.body_html.as_deref().or(self.body_text.as_deref())
    }
}

/// Trait for hosted mailbox implementations.
///
/// An implementor is an authenticated session: constructing one is the
/// authentication step, so no method needs to check for a missing login.
///
/// # Example
///
/// ```ignore
/// use mailsweep::providers::email::{MailboxApi, Pagination};
///
/// async fn first_page(api: &dyn MailboxApi) -> Result<()> {
///     let page = api.list("in:spam", &Pagination::with_limit(100)).await?;
///     for message in page.messages {
///         println!("{}", message.id);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MailboxApi: Send + Sync {
    /// Lists messages matching a provider search query.
    async fn list(&self, query: &str, pagination: &Pagination) -> Result<ListPage>;

    /// Fetches a restricted set of headers for one message.
    async fn get_metadata(&self, id: &MessageId, fields: &[HeaderField]) -> Result<Vec<Header>>;

    /// Fetches a message with decoded body parts.
    async fn get_full(&self, id: &MessageId) -> Result<FullMessage>;

    /// Permanently deletes messages.
    ///
    /// At most [`MailboxApi::bulk_delete_cap`] ids may be passed per call.
    async fn bulk_delete(&self, ids: &[MessageId]) -> Result<()>;

    /// Largest number of ids accepted by one [`MailboxApi::bulk_delete`] call.
    fn bulk_delete_cap(&self) -> usize;

    /// Adds and removes labels on a single message.
    async fn modify_labels(&self, id: &MessageId, add: &[LabelId], remove: &[LabelId])
        -> Result<()>;

    /// Creates a label.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AlreadyExists`] if a label with that name exists.
    async fn create_label(&self, name: &str, color: Option<&LabelColor>) -> Result<Label>;

    /// Lists all labels, system labels included.
    async fn list_labels(&self) -> Result<Vec<Label>>;

    /// Creates a server-side filter.
    async fn create_filter(&self, criteria: &FilterCriteria, action: &FilterAction)
        -> Result<Filter>;

    /// Fetches account totals.
    async fn get_profile(&self) -> Result<MailboxProfile>;
}
