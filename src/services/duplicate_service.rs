//! Cleanup of repeated automated notifications.
//!
//! Login alerts, verification codes, order confirmations and no-reply mail
//! from the last few days are grouped by sender and digit-stripped subject.
//! Each group keeps its newest message; the rest are deleted.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::domain::{DuplicateCleanup, HeaderField, MessageId, MessageMetadata};
use crate::providers::email::{MailboxApi, Pagination, Result};

use super::grouping::{duplicate_key, partition_by_key};
use super::mailbox_service::MailboxService;

const FIELDS: [HeaderField; 3] = [HeaderField::From, HeaderField::Subject, HeaderField::Date];

#[derive(Debug, Clone, Default)]
pub struct DuplicateService {
    mailbox: MailboxService,
}

impl DuplicateService {
    pub fn new(settings: Settings) -> Self {
        Self {
            mailbox: MailboxService::new(settings),
        }
    }

    /// Deletes all but the newest message of every duplicate group.
    ///
    /// Failing queries, metadata fetches and group deletions are logged and
    /// skipped; only catastrophic errors end the cleanup.
    pub async fn clean(&self, api: &dyn MailboxApi) -> Result<DuplicateCleanup> {
        let candidates = self.collect(api).await?;
        let mut outcome = DuplicateCleanup::default();

        let partitions = partition_by_key(candidates, |m| {
            duplicate_key(&m.headers.from, &m.headers.subject)
        });

        for (key, mut members) in partitions {
            if members.len() < 2 {
                continue;
            }
            outcome.groups += 1;

            newest_first(&mut members);
            let stale: Vec<MessageId> = members[1..]
                .iter()
                .map(|m| m.reference.id.clone())
                .collect();

            match self.mailbox.delete_messages(api, &stale).await {
                Ok(deleted) => outcome.deleted += deleted,
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => warn!(key = %key, error = %e, "Deleting duplicates failed"),
            }
        }

        info!(deleted = outcome.deleted, groups = outcome.groups, "Duplicate cleanup finished");
        Ok(outcome)
    }

    /// Runs every automated query inside the recency window and fetches
    /// headers for each distinct message.
    async fn collect(&self, api: &dyn MailboxApi) -> Result<Vec<MessageMetadata>> {
        let automated = &self.mailbox.settings().automated;
        let pagination = Pagination::with_limit(automated.per_query_limit);
        let mut seen = HashSet::new();
        let mut refs = Vec::new();

        for query in &automated.queries {
            let windowed = format!("{} {}", query, automated.window);
            match api.list(&windowed, &pagination).await {
                Ok(page) => refs.extend(
                    page.messages
                        .into_iter()
                        .filter(|m| seen.insert(m.id.clone())),
                ),
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => warn!(query = %windowed, error = %e, "Skipping query"),
            }
        }

        debug!(candidates = refs.len(), "Collected automated notifications");
        self.mailbox.fetch_metadata(api, &refs, &FIELDS).await
    }
}

/// Sorts newest first by `Date` header. Undated messages sort last and keep
/// their relative order.
fn newest_first(members: &mut [MessageMetadata]) {
    members.sort_by_cached_key(|m| std::cmp::Reverse(parse_date(&m.headers.date)));
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    // Strip trailing comments such as "(UTC)".
    let value = value.split(" (").next().unwrap_or(value).trim();
    DateTime::parse_from_rfc2822(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRef;
    use crate::providers::email::ProviderError;
    use crate::services::testing::FakeMailbox;
    use pretty_assertions::assert_eq;

    const LOGIN: &str = r#"subject:"accesso" OR subject:"login" OR subject:"signin" newer_than:7d"#;
    const NOREPLY: &str = "from:noreply OR from:no-reply OR from:donotreply newer_than:7d";

    fn refs(ids: &[&str]) -> Vec<MessageRef> {
        ids.iter().map(|id| MessageRef::new(*id, "t")).collect()
    }

    #[test]
    fn parses_dates_with_comments() {
        assert!(parse_date("Mon, 6 Jan 2025 10:00:00 +0000 (UTC)").is_some());
        assert!(parse_date("Mon, 6 Jan 2025 10:00:00 +0100").is_some());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("").is_none());
    }

    #[tokio::test]
    async fn keeps_newest_of_each_group() {
        let api = FakeMailbox::new()
            .with_query(LOGIN, refs(&["old", "new", "mid"]))
            .with_message("old", "Bank <alerts@bank.com>", "Login code 1111", "Mon, 6 Jan 2025 08:00:00 +0000", "")
            .with_message("new", "Bank <alerts@bank.com>", "Login code 2222", "Mon, 6 Jan 2025 10:00:00 +0000", "")
            .with_message("mid", "Bank <alerts@bank.com>", "Login code 3333", "Mon, 6 Jan 2025 09:00:00 +0000", "");

        let outcome = DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(outcome, DuplicateCleanup { deleted: 2, groups: 1 });
        assert_eq!(
            api.deleted_ids(),
            vec![MessageId::from("mid"), MessageId::from("old")]
        );
    }

    #[tokio::test]
    async fn singletons_are_left_alone() {
        let api = FakeMailbox::new()
            .with_query(LOGIN, refs(&["a", "b"]))
            .with_message("a", "x@a.com", "Sign-in", "", "")
            .with_message("b", "y@b.com", "Sign-in", "", "");

        let outcome = DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(outcome, DuplicateCleanup::default());
        assert!(api.delete_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_matching_several_queries_count_once() {
        let api = FakeMailbox::new()
            .with_query(LOGIN, refs(&["a", "b"]))
            .with_query(NOREPLY, refs(&["b", "a"]))
            .with_message("a", "noreply@x.com", "Login 1", "Mon, 6 Jan 2025 08:00:00 +0000", "")
            .with_message("b", "noreply@x.com", "Login 2", "Mon, 6 Jan 2025 09:00:00 +0000", "");

        let outcome = DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(outcome, DuplicateCleanup { deleted: 1, groups: 1 });
        assert_eq!(api.deleted_ids(), vec![MessageId::from("a")]);
    }

    #[tokio::test]
    async fn undated_messages_are_deleted_first() {
        let api = FakeMailbox::new()
            .with_query(LOGIN, refs(&["undated", "dated"]))
            .with_message("undated", "a@x.com", "Code", "garbage", "")
            .with_message("dated", "a@x.com", "Code", "Mon, 6 Jan 2025 08:00:00 +0000", "");

        DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(api.deleted_ids(), vec![MessageId::from("undated")]);
    }

    #[tokio::test]
    async fn failing_query_is_skipped() {
        let api = FakeMailbox::new()
            .with_list_error(LOGIN, ProviderError::Connection("reset".into()))
            .with_query(NOREPLY, refs(&["a", "b"]))
            .with_message("a", "noreply@x.com", "Hi", "", "")
            .with_message("b", "noreply@x.com", "Hi", "", "");

        let outcome = DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(outcome.groups, 1);
        assert_eq!(outcome.deleted, 1);
    }

    #[tokio::test]
    async fn failed_group_delete_is_not_counted() {
        let api = FakeMailbox::new()
            .with_query(LOGIN, refs(&["a", "b"]))
            .with_message("a", "a@x.com", "Code", "", "")
            .with_message("b", "a@x.com", "Code", "", "")
            .with_delete_error(0, ProviderError::Provider("backend".into()));

        let outcome = DuplicateService::default().clean(&api).await.unwrap();

        assert_eq!(outcome, DuplicateCleanup { deleted: 0, groups: 1 });
    }

    #[tokio::test]
    async fn auth_failure_propagates() {
        let api = FakeMailbox::new()
            .with_list_error(LOGIN, ProviderError::Authentication("expired".into()));
        assert!(DuplicateService::default().clean(&api).await.is_err());
    }
}
