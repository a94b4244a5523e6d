//! `reqwest`-backed [`UnsubscribeClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;

use super::{UnsubscribeClient, UnsubscribeError, UnsubscribeResult};

/// Unsubscribe client built on a shared `reqwest::Client`.
///
/// Redirects are followed with reqwest's default policy; no cookies are kept.
#[derive(Debug, Clone, Default)]
pub struct ReqwestUnsubscribeClient {
    client: reqwest::Client,
}

impl ReqwestUnsubscribeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the HTTP client (useful for proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnsubscribeClient for ReqwestUnsubscribeClient {
    async fn http_get(
        &self,
        url: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> UnsubscribeResult<u16> {
        let url = reqwest::Url::parse(url).map_err(|e| UnsubscribeError::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UnsubscribeError::Timeout(timeout)
                } else {
                    UnsubscribeError::Transport(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }
}
