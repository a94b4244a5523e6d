//! Newsletter cleanup pipeline.
//!
//! A run lists candidate messages, fetches their headers, groups them by
//! sender and then processes the groups one by one: resolve the unsubscribe
//! target, fire it when it is a web link, and delete the group's messages
//! when the outcome allows it.
//!
//! Every invocation of [`NewsletterService::prepare`] produces an independent
//! [`CleanupRun`] with its own [`RunId`]. A run can be driven group by group,
//! consumed as a [`Stream`], or folded in one go by [`NewsletterService::run`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::config::Settings;
use crate::domain::{
    GroupResult, GroupStatus, HeaderField, MessageId, Progress, RunId, RunStats, SenderGroup,
    UnsubscribeLink,
};
use crate::providers::email::{MailboxApi, ProviderError};
use crate::providers::web::UnsubscribeClient;

use super::grouping::group_by_sender;
use super::mailbox_service::MailboxService;
use super::unsubscribe;

/// Errors that end a cleanup run.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Candidate collection failed before any group was processed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A catastrophic failure stopped the run partway.
    #[error("cleanup aborted after {} groups: {source}", .report.results.len())]
    Aborted {
        source: ProviderError,
        report: Box<CleanupReport>,
    },

    /// The run was cancelled between groups.
    #[error("cleanup cancelled after {} groups", .report.results.len())]
    Cancelled { report: Box<CleanupReport> },
}

impl CleanupError {
    /// Results of the groups completed before the run ended, if any.
    pub fn partial_report(&self) -> Option<&CleanupReport> {
        match self {
            CleanupError::Provider(_) => None,
            CleanupError::Aborted { report, .. } | CleanupError::Cancelled { report } => {
                Some(report)
            }
        }
    }
}

/// Result type for cleanup runs.
pub type CleanupResult<T> = std::result::Result<T, CleanupError>;

/// Everything a finished (or interrupted) run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub run_id: RunId,
    /// One result per processed group, in processing order.
    pub results: Vec<GroupResult>,
    pub stats: RunStats,
}

impl CleanupReport {
    /// Groups whose unsubscribe target needs the user.
    pub fn manual_actions(&self) -> impl Iterator<Item = &GroupResult> {
        self.results.iter().filter(|r| r.needs_manual_action())
    }
}

/// Cooperative cancellation flag, checked between groups.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop before its next group.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Turns one sender group into its [`GroupResult`].
pub struct GroupProcessor<'a> {
    api: &'a dyn MailboxApi,
    web: &'a dyn UnsubscribeClient,
    mailbox: &'a MailboxService,
}

impl<'a> GroupProcessor<'a> {
    pub fn new(
        api: &'a dyn MailboxApi,
        web: &'a dyn UnsubscribeClient,
        mailbox: &'a MailboxService,
    ) -> Self {
        Self { api, web, mailbox }
    }

    /// Processes a group.
    ///
    /// Only catastrophic provider errors are returned; everything else is
    /// folded into the result's status and error text.
    pub async fn process(&self, group: &SenderGroup) -> Result<GroupResult, ProviderError> {
        let mut result = GroupResult::pending(group);
        let link = self.resolve_link(group).await?;
        result.unsubscribe_link = link.clone();

        match link {
            None => result.status = GroupStatus::NoLink,
            Some(link) if link.is_mailto() => {
                result.status = GroupStatus::Manual;
                result.error = Some(format!("manual unsubscribe required: send an email via {link}"));
            }
            Some(link) => {
                let (status, error) = self.fire(&link).await;
                result.status = status;
                result.error = error;
            }
        }

        if result.status.allows_deletion() {
            let ids: Vec<MessageId> = group.messages.iter().map(|m| m.id.clone()).collect();
            match self.mailbox.delete_messages(self.api, &ids).await {
                Ok(deleted) => result.deleted_count = deleted,
                Err(e) if e.is_catastrophic() => return Err(e),
                Err(e) => {
                    warn!(sender = %group.key, error = %e, "Deleting group messages failed");
                    result
                        .error
                        .get_or_insert_with(|| format!("failed to delete messages: {e}"));
                }
            }
        }

        info!(
            sender = %group.key,
            status = %result.status,
            count = result.email_count,
            deleted = result.deleted_count,
            "Processed sender group"
        );
        Ok(result)
    }

    /// Resolves the group's target, scraping the first message's body when
    /// the group carries no `List-Unsubscribe` directive.
    async fn resolve_link(&self, group: &SenderGroup) -> Result<Option<UnsubscribeLink>, ProviderError> {
        if !group.list_unsubscribe.trim().is_empty() {
            return Ok(unsubscribe::resolve(&group.list_unsubscribe, None));
        }

        let Some(first) = group.messages.first() else {
            return Ok(None);
        };

        match self.api.get_full(&first.id).await {
            Ok(message) => Ok(unsubscribe::resolve("", message.scan_body())),
            Err(e) if e.is_catastrophic() => Err(e),
            Err(e) => {
                warn!(sender = %group.key, message_id = %first.id, error = %e, "Body fetch failed, continuing without body");
                Ok(None)
            }
        }
    }

    async fn fire(&self, link: &UnsubscribeLink) -> (GroupStatus, Option<String>) {
        let settings = &self.mailbox.settings().unsubscribe;
        match self
            .web
            .http_get(link.as_str(), settings.timeout(), &settings.user_agent)
            .await
        {
            Ok(status) if status < 400 => (GroupStatus::Success, None),
            Ok(status) => (
                GroupStatus::Failed,
                Some(format!("unsubscribe request returned HTTP {status}")),
            ),
            Err(e) => (GroupStatus::Failed, Some(e.to_string())),
        }
    }
}

/// One in-flight cleanup run.
///
/// Finite and non-restartable: once it yields `None` or an error, it is done.
pub struct CleanupRun<'a> {
    id: RunId,
    processor: GroupProcessor<'a>,
    groups: VecDeque<SenderGroup>,
    total_groups: usize,
    completed: usize,
    total_emails: usize,
    cancel: CancelHandle,
    cancelled: bool,
    finished: bool,
    span: Span,
}

impl<'a> CleanupRun<'a> {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Candidate messages returned by the newsletter query.
    pub fn total_emails(&self) -> usize {
        self.total_emails
    }

    pub fn group_count(&self) -> usize {
        self.total_groups
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed,
            total: self.total_groups,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the run stopped because of a cancellation request.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Processes the next group.
    ///
    /// Returns `None` when all groups are done or the run was cancelled.
    /// After an error the run yields nothing further.
    pub async fn next_result(&mut self) -> Option<Result<GroupResult, ProviderError>> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            info!(parent: &self.span, remaining = self.groups.len(), "Cleanup cancelled");
            self.cancelled = true;
            self.finished = true;
            return None;
        }
        let Some(group) = self.groups.pop_front() else {
            self.finished = true;
            return None;
        };

        let outcome = self
            .processor
            .process(&group)
            .instrument(self.span.clone())
            .await;

        match &outcome {
            Ok(_) => self.completed += 1,
            Err(e) => {
                warn!(parent: &self.span, sender = %group.key, error = %e, "Cleanup aborted");
                self.finished = true;
            }
        }
        Some(outcome)
    }

    /// Lazily yields one result per group.
    pub fn into_stream(self) -> impl Stream<Item = Result<GroupResult, ProviderError>> + 'a {
        stream::unfold(self, |mut run| async move {
            let item = run.next_result().await?;
            Some((item, run))
        })
    }
}

/// Entry point of the newsletter cleanup.
#[derive(Debug, Clone, Default)]
pub struct NewsletterService {
    mailbox: MailboxService,
}

impl NewsletterService {
    pub fn new(settings: Settings) -> Self {
        Self {
            mailbox: MailboxService::new(settings),
        }
    }

    /// Collects and groups candidates, returning a run ready to process.
    pub async fn prepare<'a>(
        &'a self,
        api: &'a dyn MailboxApi,
        web: &'a dyn UnsubscribeClient,
        cancel: CancelHandle,
    ) -> CleanupResult<CleanupRun<'a>> {
        let id = RunId::new();
        let span = info_span!("newsletter_cleanup", run_id = %id);
        let settings = &self.mailbox.settings().newsletters;

        let (total_emails, groups) = async {
            let refs = self
                .mailbox
                .list_all(api, &settings.query, settings.max_messages)
                .await?;
            let metadata = self
                .mailbox
                .fetch_metadata(api, &refs, &HeaderField::ALL)
                .await?;
            let groups = group_by_sender(&metadata);
            info!(candidates = refs.len(), groups = groups.len(), "Grouped newsletter candidates");
            Ok::<_, ProviderError>((refs.len(), groups))
        }
        .instrument(span.clone())
        .await?;

        Ok(CleanupRun {
            id,
            processor: GroupProcessor::new(api, web, &self.mailbox),
            total_groups: groups.len(),
            groups: groups.into(),
            completed: 0,
            total_emails,
            cancel,
            cancelled: false,
            finished: false,
            span,
        })
    }

    /// Runs a full cleanup, reporting progress after every group.
    pub async fn run<F>(
        &self,
        api: &dyn MailboxApi,
        web: &dyn UnsubscribeClient,
        cancel: CancelHandle,
        mut on_progress: F,
    ) -> CleanupResult<CleanupReport>
    where
        F: FnMut(Progress),
    {
        let mut run = self.prepare(api, web, cancel).await?;
        let mut report = CleanupReport {
            run_id: run.id(),
            results: Vec::with_capacity(run.group_count()),
            stats: RunStats::new(run.total_emails()),
        };

        while let Some(outcome) = run.next_result().await {
            match outcome {
                Ok(result) => {
                    report.stats.record(&result);
                    report.results.push(result);
                    on_progress(run.progress());
                }
                Err(source) => {
                    return Err(CleanupError::Aborted {
                        source,
                        report: Box::new(report),
                    })
                }
            }
        }

        if run.was_cancelled() {
            return Err(CleanupError::Cancelled {
                report: Box::new(report),
            });
        }

        debug!(run_id = %report.run_id, stats = ?report.stats, "Newsletter cleanup finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageRef;
    use crate::providers::email::FullMessage;
    use crate::providers::web::{MockUnsubscribeClient, UnsubscribeError};
    use crate::services::testing::{refs, FakeMailbox};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const QUERY: &str = "unsubscribe OR list-unsubscribe";

    fn group(key: &str, unsub: &str, ids: Vec<MessageRef>) -> SenderGroup {
        SenderGroup {
            key: key.to_string(),
            sender: format!("Sender <{key}>"),
            list_unsubscribe: unsub.to_string(),
            messages: ids,
        }
    }

    fn quiet_web() -> MockUnsubscribeClient {
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get().never();
        web
    }

    fn web_returning(status: u16) -> MockUnsubscribeClient {
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get()
            .times(1)
            .returning(move |_, _, _| Ok(status));
        web
    }

    async fn process(api: &FakeMailbox, web: &MockUnsubscribeClient, group: &SenderGroup) -> GroupResult {
        let mailbox = MailboxService::default();
        GroupProcessor::new(api, web, &mailbox)
            .process(group)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mailto_group_is_manual_and_kept() {
        let api = FakeMailbox::new();
        let g = group("a@x.com", "<mailto:unsub@x.com>", refs("m", 3));

        let result = process(&api, &quiet_web(), &g).await;

        assert_eq!(result.status, GroupStatus::Manual);
        assert_eq!(result.deleted_count, 0);
        assert!(result.error.is_some());
        assert_eq!(
            result.unsubscribe_link.as_ref().map(|l| l.as_str()),
            Some("mailto:unsub@x.com")
        );
        assert!(api.delete_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_link_group_is_deleted() {
        let api = FakeMailbox::new().with_body(
            "m0",
            FullMessage {
                body_text: Some("Thanks for your order".into()),
                ..FullMessage::default()
            },
        );
        let g = group("b@x.com", "", refs("m", 5));

        let result = process(&api, &quiet_web(), &g).await;

        assert_eq!(result.status, GroupStatus::NoLink);
        assert_eq!(result.deleted_count, 5);
        assert_eq!(result.unsubscribe_link, None);
        assert_eq!(api.full_calls.lock().unwrap().as_slice(), [MessageId::from("m0")]);
        assert_eq!(api.deleted_ids().len(), 5);
    }

    #[tokio::test]
    async fn accepted_request_unsubscribes_and_deletes() {
        let api = FakeMailbox::new();
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get()
            .withf(|url, timeout, agent| {
                url.eq("https://x.com/u")
                    && *timeout == Duration::from_secs(10)
                    && agent.contains("mailsweep")
            })
            .times(1)
            .returning(|_, _, _| Ok(200));
        let g = group("c@x.com", "<https://x.com/u>", refs("m", 2));

        let result = process(&api, &web, &g).await;

        assert_eq!(result.status, GroupStatus::Success);
        assert_eq!(result.deleted_count, 2);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn server_error_fails_without_deleting() {
        let api = FakeMailbox::new();
        let g = group("d@x.com", "<https://x.com/u>", refs("m", 4));

        let result = process(&api, &web_returning(500), &g).await;

        assert_eq!(result.status, GroupStatus::Failed);
        assert_eq!(result.deleted_count, 0);
        assert!(result.error.unwrap().contains("500"));
        assert!(api.delete_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn redirect_status_counts_as_success() {
        let api = FakeMailbox::new();
        let g = group("d@x.com", "<https://x.com/u>", refs("m", 1));
        let result = process(&api, &web_returning(302), &g).await;
        assert_eq!(result.status, GroupStatus::Success);
    }

    #[tokio::test]
    async fn timeout_fails_the_group() {
        let api = FakeMailbox::new();
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get()
            .returning(|_, timeout, _| Err(UnsubscribeError::Timeout(timeout)));
        let g = group("e@x.com", "<https://x.com/u>", refs("m", 2));

        let result = process(&api, &web, &g).await;

        assert_eq!(result.status, GroupStatus::Failed);
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(result.deleted_count, 0);
    }

    #[tokio::test]
    async fn body_link_is_used_when_directive_is_empty() {
        let api = FakeMailbox::new().with_body(
            "m0",
            FullMessage {
                body_html: Some(r#"<a href="https://x.com/unsubscribe">bye</a>"#.into()),
                ..FullMessage::default()
            },
        );
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get()
            .withf(|url, _, _| url.eq("https://x.com/unsubscribe"))
            .times(1)
            .returning(|_, _, _| Ok(200));
        let g = group("f@x.com", "", refs("m", 2));

        let result = process(&api, &web, &g).await;

        assert_eq!(result.status, GroupStatus::Success);
        assert_eq!(
            result.unsubscribe_link.unwrap().as_str(),
            "https://x.com/unsubscribe"
        );
    }

    #[tokio::test]
    async fn body_fetch_failure_means_no_body() {
        let api = FakeMailbox::new().with_full_error("m0", ProviderError::NotFound("m0".into()));
        let g = group("g@x.com", "", refs("m", 2));

        let result = process(&api, &quiet_web(), &g).await;

        assert_eq!(result.status, GroupStatus::NoLink);
        assert_eq!(result.deleted_count, 2);
    }

    #[tokio::test]
    async fn non_empty_directive_skips_body_fetch() {
        let api = FakeMailbox::new();
        let g = group("h@x.com", "<ftp://x.com/u>", refs("m", 1));

        let result = process(&api, &quiet_web(), &g).await;

        assert_eq!(result.status, GroupStatus::NoLink);
        assert!(api.full_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_failure_keeps_status_and_records_error() {
        let api = FakeMailbox::new()
            .with_delete_error(0, ProviderError::RateLimited { retry_after_secs: Some(5) });
        let g = group("i@x.com", "<https://x.com/u>", refs("m", 3));

        let result = process(&api, &web_returning(200), &g).await;

        assert_eq!(result.status, GroupStatus::Success);
        assert_eq!(result.deleted_count, 0);
        assert!(result.error.unwrap().contains("rate limit"));
    }

    #[tokio::test]
    async fn delete_auth_failure_propagates() {
        let api = FakeMailbox::new()
            .with_delete_error(0, ProviderError::Authentication("revoked".into()));
        let mailbox = MailboxService::default();
        let web = web_returning(200);
        let g = group("j@x.com", "<https://x.com/u>", refs("m", 1));

        let outcome = GroupProcessor::new(&api, &web, &mailbox).process(&g).await;

        assert!(matches!(outcome, Err(ProviderError::Authentication(_))));
    }

    fn newsletter_mailbox() -> FakeMailbox {
        FakeMailbox::new()
            .with_query(
                QUERY,
                vec![
                    MessageRef::new("a1", "t"),
                    MessageRef::new("b1", "t"),
                    MessageRef::new("a2", "t"),
                    MessageRef::new("c1", "t"),
                ],
            )
            .with_message("a1", "A <a@x.com>", "s", "", "<https://a.com/u>")
            .with_message("b1", "b@x.com", "s", "", "<mailto:b@x.com>")
            .with_message("a2", "a@x.com", "s", "", "")
            .with_message("c1", "c@x.com", "s", "", "")
    }

    #[tokio::test]
    async fn run_processes_groups_in_order() {
        let api = newsletter_mailbox();
        let web = web_returning(200);
        let service = NewsletterService::default();
        let mut progress = Vec::new();

        let report = service
            .run(&api, &web, CancelHandle::new(), |p| progress.push(p.fraction()))
            .await
            .unwrap();

        let senders: Vec<&str> = report.results.iter().map(|r| r.from.as_str()).collect();
        assert_eq!(senders, vec!["A <a@x.com>", "b@x.com", "c@x.com"]);
        assert_eq!(
            report.stats,
            RunStats {
                total_emails: 4,
                unsubscribed: 1,
                deleted: 3,
                manual: 1,
            }
        );
        assert_eq!(report.manual_actions().count(), 1);
        assert_eq!(progress.len(), 3);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&1.0));
    }

    #[tokio::test]
    async fn runs_are_independent() {
        let api = newsletter_mailbox();
        let mut web = MockUnsubscribeClient::new();
        web.expect_http_get().returning(|_, _, _| Ok(200));
        let service = NewsletterService::default();

        let first = service.run(&api, &web, CancelHandle::new(), |_| {}).await.unwrap();
        let second = service.run(&api, &web, CancelHandle::new(), |_| {}).await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.stats, second.stats);
    }

    #[tokio::test]
    async fn empty_candidate_set_yields_empty_report() {
        let api = FakeMailbox::new();
        let report = NewsletterService::default()
            .run(&api, &quiet_web(), CancelHandle::new(), |_| {})
            .await
            .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.stats, RunStats::default());
    }

    #[tokio::test]
    async fn listing_auth_failure_is_a_run_error() {
        let api = FakeMailbox::new()
            .with_list_error(QUERY, ProviderError::Authentication("expired".into()));

        let err = NewsletterService::default()
            .run(&api, &quiet_web(), CancelHandle::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, CleanupError::Provider(ProviderError::Authentication(_))));
        assert!(err.partial_report().is_none());
    }

    #[tokio::test]
    async fn listing_connection_failure_is_not_an_empty_run() {
        let api = FakeMailbox::new()
            .with_list_error(QUERY, ProviderError::Connection("reset".into()));

        let err = NewsletterService::default()
            .run(&api, &quiet_web(), CancelHandle::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, CleanupError::Provider(ProviderError::Connection(_))));
        assert!(api.delete_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn catastrophic_failure_keeps_completed_groups() {
        let api = newsletter_mailbox()
            .with_full_error("c1", ProviderError::Authentication("revoked".into()));
        let web = web_returning(200);

        let err = NewsletterService::default()
            .run(&api, &web, CancelHandle::new(), |_| {})
            .await
            .unwrap_err();

        let report = err.partial_report().unwrap();
        assert!(matches!(err, CleanupError::Aborted { .. }));
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.stats.unsubscribed, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_between_groups() {
        let api = newsletter_mailbox();
        let web = web_returning(200);
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();

        let err = NewsletterService::default()
            .run(&api, &web, cancel, |_| trigger.cancel())
            .await
            .unwrap_err();

        let report = err.partial_report().unwrap();
        assert!(matches!(err, CleanupError::Cancelled { .. }));
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.stats.deleted, 2);
    }

    #[tokio::test]
    async fn run_is_a_lazy_stream() {
        let api = newsletter_mailbox();
        let web = web_returning(200);
        let service = NewsletterService::default();

        let run = service
            .prepare(&api, &web, CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(run.group_count(), 3);
        assert_eq!(run.progress(), Progress { completed: 0, total: 3 });
        assert!(api.delete_calls.lock().unwrap().is_empty());

        let results: Vec<_> = run.into_stream().collect().await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn max_messages_caps_candidates() {
        let api = newsletter_mailbox();
        let mut settings = Settings::default();
        settings.newsletters.max_messages = Some(2);
        let web = web_returning(200);

        let report = NewsletterService::new(settings)
            .run(&api, &web, CancelHandle::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(report.stats.total_emails, 2);
        assert_eq!(report.results.len(), 2);
    }
}
