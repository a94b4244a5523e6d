//! Outbound web capabilities used by the unsubscribe flow.
//!
//! - [`UnsubscribeClient`] fires the one-click unsubscribe request.
//! - [`ExternalOpener`] hands a URL (usually a `mailto:`) to the OS.

mod http;
mod opener;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use http::ReqwestUnsubscribeClient;
pub use opener::SystemOpener;

/// Errors from an outbound unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsubscribeError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Result type for outbound unsubscribe requests.
pub type UnsubscribeResult<T> = Result<T, UnsubscribeError>;

/// Issues the GET request behind an unsubscribe link.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnsubscribeClient: Send + Sync {
    /// Requests `url` and returns the final HTTP status code.
    ///
    /// Only transport-level problems are errors; any status, including
    /// 4xx/5xx, is returned as `Ok`.
    async fn http_get(&self, url: &str, timeout: Duration, user_agent: &str)
        -> UnsubscribeResult<u16>;
}

/// Opens a URL with the operating system's default handler.
#[cfg_attr(test, mockall::automock)]
pub trait ExternalOpener: Send + Sync {
    /// Fire-and-forget; failures are logged by the implementation.
    fn open(&self, url: &str);
}
