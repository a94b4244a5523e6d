//! Mailbox-level operations shared by the cleanup pipelines.
//!
//! Provides:
//! - Paginated listing with an optional cap
//! - Sequential metadata fetches that skip per-message failures
//! - Bulk deletion chunked to the provider's batch cap
//! - Category scan, archive, labeling and filters

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{
    system_labels, AttachmentSummary, CategoryCounts, Filter, FilterAction, FilterCriteria,
    HeaderField, HeaderSet, Label, LabelColor, LabelId, MailboxScan, MessageId, MessageMetadata,
    MessageRef,
};
use crate::providers::email::{MailboxApi, Pagination, ProviderError, Result};

/// Queries feeding the spam & promotions listing.
const SPAM_PROMOTION_QUERIES: [&str; 4] =
    ["category:promotions", "category:social", "in:spam", "older_than:6m"];

/// Stateless mailbox operations parameterized by [`Settings`].
///
/// Every method takes the authenticated mailbox as an argument; the service
/// never holds on to a session.
#[derive(Debug, Clone, Default)]
pub struct MailboxService {
    settings: Settings,
}

impl MailboxService {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Lists every message matching `query`, following page tokens.
    ///
    /// Stops once `cap` references are collected. Any page failure fails the
    /// whole listing; a partial candidate set is never returned.
    pub async fn list_all(
        &self,
        api: &dyn MailboxApi,
        query: &str,
        cap: Option<usize>,
    ) -> Result<Vec<MessageRef>> {
        let first = Pagination::with_limit(self.settings.api.page_size);
        let mut pagination = first.clone();
        let mut collected: Vec<MessageRef> = Vec::new();

        loop {
            let page = api.list(query, &pagination).await.inspect_err(|e| {
                warn!(query, error = %e, collected = collected.len(), "Listing page failed");
            })?;

            collected.extend(page.messages);
            if let Some(cap) = cap {
                if collected.len() >= cap {
                    collected.truncate(cap);
                    break;
                }
            }

            match page.next_page_token {
                Some(token) => pagination = first.at(token),
                None => break,
            }
        }

        debug!(query, count = collected.len(), "Listed messages");
        Ok(collected)
    }

    /// Fetches normalized headers for each reference, one at a time.
    ///
    /// Messages whose fetch fails are logged and left out.
    pub async fn fetch_metadata(
        &self,
        api: &dyn MailboxApi,
        refs: &[MessageRef],
        fields: &[HeaderField],
    ) -> Result<Vec<MessageMetadata>> {
        let mut metadata = Vec::with_capacity(refs.len());

        for reference in refs {
            match api.get_metadata(&reference.id, fields).await {
                Ok(headers) => {
                    metadata.push(MessageMetadata::from_headers(reference.clone(), &headers))
                }
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => warn!(message_id = %reference.id, error = %e, "Skipping message, metadata fetch failed"),
            }
        }

        Ok(metadata)
    }

    /// Permanently deletes `ids`, split into chunks of the provider's cap.
    ///
    /// Chunks are issued in order. The first failing chunk aborts the rest;
    /// chunks already applied stay deleted.
    pub async fn delete_messages(&self, api: &dyn MailboxApi, ids: &[MessageId]) -> Result<usize> {
        let cap = api.bulk_delete_cap().max(1);

        for (index, chunk) in ids.chunks(cap).enumerate() {
            api.bulk_delete(chunk).await.inspect_err(|e| {
                warn!(chunk = index, size = chunk.len(), error = %e, "Bulk delete failed");
            })?;
        }

        debug!(count = ids.len(), "Deleted messages");
        Ok(ids.len())
    }

    /// Profile totals plus estimated counts per cleanup category.
    ///
    /// A failing category query is logged and counted as zero.
    pub async fn scan(&self, api: &dyn MailboxApi) -> Result<MailboxScan> {
        let profile = api.get_profile().await?;
        let archive_days = self.settings.archive.older_than_days;
        let min_mb = self.settings.attachments.min_size_mb;

        let categories = CategoryCounts {
            newsletters: self.estimate(api, &self.settings.newsletters.query).await?,
            spam: self.estimate(api, "in:spam").await?,
            promotions: self.estimate(api, "category:promotions").await?,
            social: self.estimate(api, "category:social").await?,
            old: self.estimate(api, &format!("older_than:{archive_days}d")).await?,
            with_attachments: self
                .estimate(api, &format!("has:attachment larger:{min_mb}M"))
                .await?,
            unread: self.estimate(api, "is:unread").await?,
        };

        info!(email = %profile.email_address, total = profile.messages_total, "Mailbox scanned");
        Ok(MailboxScan {
            total_messages: profile.messages_total,
            total_threads: profile.threads_total,
            categories,
            scanned_at: Utc::now(),
        })
    }

    async fn estimate(&self, api: &dyn MailboxApi, query: &str) -> Result<u64> {
        match api.list(query, &Pagination::with_limit(1)).await {
            Ok(page) => Ok(page.result_size_estimate),
            Err(e) if e.is_catastrophic() => Err(e),
            Err(e) => {
                warn!(query, error = %e, "Category scan failed, counting as zero");
                Ok(0)
            }
        }
    }

    /// Union of promotions, social, spam and very old mail, without repeats.
    pub async fn spam_and_promotions(&self, api: &dyn MailboxApi) -> Result<Vec<MessageRef>> {
        let pagination = Pagination::with_limit(self.settings.api.page_size);
        let mut seen = HashSet::new();
        let mut union = Vec::new();

        for query in SPAM_PROMOTION_QUERIES {
            match api.list(query, &pagination).await {
                Ok(page) => union.extend(
                    page.messages
                        .into_iter()
                        .filter(|m| seen.insert(m.id.clone())),
                ),
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => warn!(query, error = %e, "Skipping query"),
            }
        }

        Ok(union)
    }

    /// Read mail older than `days`, outside trash and spam.
    pub async fn old_messages(&self, api: &dyn MailboxApi, days: u32) -> Result<Vec<MessageRef>> {
        let query = format!("is:read older_than:{days}d -in:trash -in:spam");
        let page = api
            .list(&query, &Pagination::with_limit(self.settings.archive.limit))
            .await?;
        Ok(page.messages)
    }

    /// Messages with attachments larger than `min_size_mb`, with their parts.
    pub async fn large_attachments(
        &self,
        api: &dyn MailboxApi,
        min_size_mb: u32,
    ) -> Result<Vec<AttachmentSummary>> {
        let query = format!("has:attachment larger:{min_size_mb}M");
        let page = api
            .list(&query, &Pagination::with_limit(self.settings.attachments.limit))
            .await?;

        let mut summaries = Vec::with_capacity(page.messages.len());
        for reference in page.messages {
            let message = match api.get_full(&reference.id).await {
                Ok(message) => message,
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => {
                    warn!(message_id = %reference.id, error = %e, "Skipping message, fetch failed");
                    continue;
                }
            };

            let headers = HeaderSet::extract(&message.headers);
            summaries.push(AttachmentSummary {
                reference,
                from: headers.from,
                subject: headers.subject,
                date: headers.date,
                attachments: message.attachments,
            });
        }

        Ok(summaries)
    }

    /// Removes the inbox label from each message. Stops at the first failure.
    pub async fn archive(&self, api: &dyn MailboxApi, ids: &[MessageId]) -> Result<usize> {
        let inbox = [system_labels::inbox()];
        for id in ids {
            api.modify_labels(id, &[], &inbox).await?;
        }
        info!(count = ids.len(), "Archived messages");
        Ok(ids.len())
    }

    /// Adds `label` to each message. Stops at the first failure.
    pub async fn apply_label(
        &self,
        api: &dyn MailboxApi,
        ids: &[MessageId],
        label: &LabelId,
    ) -> Result<usize> {
        let add = std::slice::from_ref(label);
        for id in ids {
            api.modify_labels(id, add, &[]).await?;
        }
        Ok(ids.len())
    }

    /// Creates a label. Returns `None` if one with that name already exists.
    pub async fn create_label(
        &self,
        api: &dyn MailboxApi,
        name: &str,
        color: Option<&LabelColor>,
    ) -> Result<Option<Label>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "label name cannot be empty".to_string(),
            ));
        }

        match api.create_label(name, color).await {
            Ok(label) => Ok(Some(label)),
            Err(ProviderError::AlreadyExists(_)) => {
                debug!(name, "Label already exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_labels(&self, api: &dyn MailboxApi) -> Result<Vec<Label>> {
        api.list_labels().await
    }

    pub async fn create_filter(
        &self,
        api: &dyn MailboxApi,
        criteria: &FilterCriteria,
        action: &FilterAction,
    ) -> Result<Filter> {
        api.create_filter(criteria, action).await
    }
}
