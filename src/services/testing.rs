//! In-memory mailbox used by the service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    Filter, FilterAction, FilterCriteria, Header, HeaderField, Label, LabelColor, LabelId,
    MailboxProfile, MessageId, MessageRef,
};
use crate::providers::email::{FullMessage, ListPage, MailboxApi, Pagination, ProviderError, Result};

/// Mutex-backed fake of [`MailboxApi`].
///
/// Listing pages through the configured results using the offset as the
/// page token. Unknown queries return an empty page.
pub(crate) struct FakeMailbox {
    cap: usize,
    results: HashMap<String, Vec<MessageRef>>,
    estimates: HashMap<String, u64>,
    list_errors: HashMap<String, ProviderError>,
    headers: HashMap<MessageId, Vec<Header>>,
    metadata_errors: HashMap<MessageId, ProviderError>,
    bodies: HashMap<MessageId, FullMessage>,
    full_errors: HashMap<MessageId, ProviderError>,
    delete_error: Option<(usize, ProviderError)>,
    modify_error: Option<ProviderError>,
    profile: MailboxProfile,
    labels: Mutex<Vec<Label>>,
    pub list_calls: Mutex<Vec<String>>,
    pub full_calls: Mutex<Vec<MessageId>>,
    pub delete_calls: Mutex<Vec<Vec<MessageId>>>,
    pub modify_calls: Mutex<Vec<(MessageId, Vec<LabelId>, Vec<LabelId>)>>,
    pub filters: Mutex<Vec<Filter>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            cap: 1000,
            results: HashMap::new(),
            estimates: HashMap::new(),
            list_errors: HashMap::new(),
            headers: HashMap::new(),
            metadata_errors: HashMap::new(),
            bodies: HashMap::new(),
            full_errors: HashMap::new(),
            delete_error: None,
            modify_error: None,
            profile: MailboxProfile::default(),
            labels: Mutex::new(Vec::new()),
            list_calls: Mutex::new(Vec::new()),
            full_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
            modify_calls: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_query(mut self, query: &str, refs: Vec<MessageRef>) -> Self {
        self.results.insert(query.to_string(), refs);
        self
    }

    pub fn with_estimate(mut self, query: &str, estimate: u64) -> Self {
        self.estimates.insert(query.to_string(), estimate);
        self
    }

    pub fn with_list_error(mut self, query: &str, error: ProviderError) -> Self {
        self.list_errors.insert(query.to_string(), error);
        self
    }

    /// Registers a message with From/Subject/Date/List-Unsubscribe headers.
    pub fn with_message(mut self, id: &str, from: &str, subject: &str, date: &str, unsub: &str) -> Self {
        let mut headers = vec![
            Header::new("From", from),
            Header::new("Subject", subject),
            Header::new("Date", date),
        ];
        if !unsub.is_empty() {
            headers.push(Header::new("List-Unsubscribe", unsub));
        }
        self.headers.insert(MessageId::from(id), headers);
        self
    }

    pub fn with_metadata_error(mut self, id: &str, error: ProviderError) -> Self {
        self.metadata_errors.insert(MessageId::from(id), error);
        self
    }

    pub fn with_body(mut self, id: &str, message: FullMessage) -> Self {
        self.bodies.insert(MessageId::from(id), message);
        self
    }

    pub fn with_full_error(mut self, id: &str, error: ProviderError) -> Self {
        self.full_errors.insert(MessageId::from(id), error);
        self
    }

    /// Fails the `call`-th bulk delete (zero-based) and every later one.
    pub fn with_delete_error(mut self, call: usize, error: ProviderError) -> Self {
        self.delete_error = Some((call, error));
        self
    }

    pub fn with_modify_error(mut self, error: ProviderError) -> Self {
        self.modify_error = Some(error);
        self
    }

    pub fn with_profile(mut self, profile: MailboxProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_label(self, id: &str, name: &str) -> Self {
        self.labels.lock().unwrap().push(Label {
            id: LabelId::from(id),
            name: name.to_string(),
            color: None,
            is_system: false,
        });
        self
    }

    pub fn deleted_ids(&self) -> Vec<MessageId> {
        self.delete_calls.lock().unwrap().iter().flatten().cloned().collect()
    }
}

/// Message references `prefix0..prefix{n-1}`.
pub(crate) fn refs(prefix: &str, n: usize) -> Vec<MessageRef> {
    (0..n)
        .map(|i| MessageRef::new(format!("{prefix}{i}"), format!("t-{prefix}{i}")))
        .collect()
}

#[async_trait]
impl MailboxApi for FakeMailbox {
    async fn list(&self, query: &str, pagination: &Pagination) -> Result<ListPage> {
        self.list_calls.lock().unwrap().push(query.to_string());
        if let Some(error) = self.list_errors.get(query) {
            return Err(error.clone());
        }

        let all = self.results.get(query).cloned().unwrap_or_default();
        let offset: usize = pagination
            .page_token
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        let limit = pagination.limit.map(|l| l as usize).unwrap_or(all.len().max(1));
        let end = (offset + limit).min(all.len());
        let next_page_token = (end < all.len()).then(|| end.to_string());

        Ok(ListPage {
            messages: all[offset.min(end)..end].to_vec(),
            next_page_token,
            result_size_estimate: self
                .estimates
                .get(query)
                .copied()
                .unwrap_or(all.len() as u64),
        })
    }

    async fn get_metadata(&self, id: &MessageId, _fields: &[HeaderField]) -> Result<Vec<Header>> {
        if let Some(error) = self.metadata_errors.get(id) {
            return Err(error.clone());
        }
        self.headers
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    async fn get_full(&self, id: &MessageId) -> Result<FullMessage> {
        self.full_calls.lock().unwrap().push(id.clone());
        if let Some(error) = self.full_errors.get(id) {
            return Err(error.clone());
        }
        Ok(self.bodies.get(id).cloned().unwrap_or_default())
    }

    async fn bulk_delete(&self, ids: &[MessageId]) -> Result<()> {
        assert!(ids.len() <= self.cap, "bulk delete over cap");
        let mut calls = self.delete_calls.lock().unwrap();
        if let Some((call, error)) = &self.delete_error {
            if calls.len() >= *call {
                return Err(error.clone());
            }
        }
        calls.push(ids.to_vec());
        Ok(())
    }

    fn bulk_delete_cap(&self) -> usize {
        self.cap
    }

    async fn modify_labels(&self, id: &MessageId, add: &[LabelId], remove: &[LabelId]) -> Result<()> {
        if let Some(error) = &self.modify_error {
            return Err(error.clone());
        }
        self.modify_calls
            .lock()
            .unwrap()
            .push((id.clone(), add.to_vec(), remove.to_vec()));
        Ok(())
    }

    async fn create_label(&self, name: &str, color: Option<&LabelColor>) -> Result<Label> {
        let mut labels = self.labels.lock().unwrap();
        if labels.iter().any(|l| l.name == name) {
            return Err(ProviderError::AlreadyExists(name.to_string()));
        }
        let label = Label {
            id: LabelId::from(format!("Label_{}", labels.len() + 1)),
            name: name.to_string(),
            color: color.cloned(),
            is_system: false,
        };
        labels.push(label.clone());
        Ok(label)
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn create_filter(&self, criteria: &FilterCriteria, action: &FilterAction) -> Result<Filter> {
        let mut filters = self.filters.lock().unwrap();
        let filter = Filter {
            id: format!("filter-{}", filters.len() + 1),
            criteria: criteria.clone(),
            action: action.clone(),
        };
        filters.push(filter.clone());
        Ok(filter)
    }

    async fn get_profile(&self) -> Result<MailboxProfile> {
        Ok(self.profile.clone())
    }
}
