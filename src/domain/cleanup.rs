//! Domain types for the cleanup pipelines.
//!
//! A run collects candidate messages, partitions them into [`SenderGroup`]s,
//! and turns every group into exactly one [`GroupResult`]. [`RunStats`]
//! aggregates the results of a single run.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::MessageRef;

/// A resolved, actionable unsubscribe target.
///
/// Constructed only by the link resolver, so the inner string is always an
/// absolute `http`, `https` or `mailto` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeLink {
    uri: String,
    scheme: LinkScheme,
}

/// Scheme family of an [`UnsubscribeLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkScheme {
    /// `http` or `https`: can be fired automatically.
    Web,
    /// `mailto`: needs the user to send a message.
    Mailto,
}

impl UnsubscribeLink {
    pub(crate) fn new(uri: String, scheme: LinkScheme) -> Self {
        Self { uri, scheme }
    }

    /// The full URI.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The scheme family.
    pub fn scheme(&self) -> LinkScheme {
        self.scheme
    }

    pub fn is_mailto(&self) -> bool {
        self.scheme == LinkScheme::Mailto
    }
}

impl fmt::Display for UnsubscribeLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Messages sharing one normalized sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderGroup {
    /// Normalized sender key.
    pub key: String,
    /// Sender as displayed in the first message of the group.
    pub sender: String,
    /// Raw `List-Unsubscribe` value of the first message of the group.
    pub list_unsubscribe: String,
    /// Member messages, in input order.
    pub messages: Vec<MessageRef>,
}

impl SenderGroup {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Outcome classification of one sender group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupStatus {
    /// Not yet processed.
    #[default]
    Pending,
    /// Automated unsubscribe request accepted.
    Success,
    /// Automated unsubscribe request failed or was rejected.
    Failed,
    /// Unsubscribing needs user action (mailto target).
    Manual,
    /// No unsubscribe mechanism was found.
    NoLink,
}

impl GroupStatus {
    /// Whether this outcome permits deleting the group's messages.
    pub fn allows_deletion(self) -> bool {
        matches!(self, GroupStatus::Success | GroupStatus::NoLink)
    }

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            GroupStatus::Pending => "pending",
            GroupStatus::Success => "unsubscribed",
            GroupStatus::Failed => "failed",
            GroupStatus::Manual => "manual",
            GroupStatus::NoLink => "no link",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of processing one sender group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    /// Sender display string.
    pub from: String,
    /// Number of messages in the group.
    pub email_count: usize,
    /// Resolved unsubscribe target, if any.
    pub unsubscribe_link: Option<UnsubscribeLink>,
    pub status: GroupStatus,
    /// Either 0 or `email_count`.
    pub deleted_count: usize,
    /// Human-readable description of what went wrong or what to do next.
    pub error: Option<String>,
}

impl GroupResult {
    /// Creates a pending result for a group.
    pub fn pending(group: &SenderGroup) -> Self {
        Self {
            from: group.sender.clone(),
            email_count: group.len(),
            unsubscribe_link: None,
            status: GroupStatus::Pending,
            deleted_count: 0,
            error: None,
        }
    }

    /// Whether the user still has to act on this group.
    pub fn needs_manual_action(&self) -> bool {
        self.status == GroupStatus::Manual
    }
}

/// Aggregate counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Candidate messages that entered grouping.
    pub total_emails: usize,
    /// Groups whose unsubscribe request succeeded.
    pub unsubscribed: usize,
    /// Messages deleted.
    pub deleted: usize,
    /// Groups left for manual action.
    pub manual: usize,
}

impl RunStats {
    /// Starts a fresh set of counters for a run over `total_emails` candidates.
    pub fn new(total_emails: usize) -> Self {
        Self {
            total_emails,
            ..Self::default()
        }
    }

    /// Folds one group result into the counters.
    pub fn record(&mut self, result: &GroupResult) {
        if result.status == GroupStatus::Success {
            self.unsubscribed += 1;
        }
        if result.status == GroupStatus::Manual {
            self.manual += 1;
        }
        self.deleted += result.deleted_count;
    }
}

/// Progress of a run, reported after every processed group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction of groups processed, in `[0, 1]`. An empty run is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed.min(self.total) as f64) / (self.total as f64)
        }
    }
}
