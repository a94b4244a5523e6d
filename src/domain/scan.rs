//! Mailbox overview types: profile totals, category scan, attachment summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageRef;

/// Account-level totals reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxProfile {
    pub email_address: String,
    pub messages_total: u64,
    pub threads_total: u64,
}

/// Estimated message counts per cleanup category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub newsletters: u64,
    pub spam: u64,
    pub promotions: u64,
    pub social: u64,
    pub old: u64,
    pub with_attachments: u64,
    pub unread: u64,
}

/// Result of a mailbox scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxScan {
    pub total_messages: u64,
    pub total_threads: u64,
    pub categories: CategoryCounts,
    pub scanned_at: DateTime<Utc>,
}

/// One attachment part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentPart {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
}

/// A message together with its attachment summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub reference: MessageRef,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub attachments: Vec<AttachmentPart>,
}

impl AttachmentSummary {
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Sum of all attachment sizes in bytes.
    pub fn total_size(&self) -> u64 {
        self.attachments.iter().map(|a| a.size).sum()
    }
}

/// Outcome of the automated-duplicate cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCleanup {
    /// Messages deleted.
    pub deleted: usize,
    /// Groups that contained more than one message.
    pub groups: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_totals() {
        let summary = AttachmentSummary {
            reference: MessageRef::new("m1", "t1"),
            from: String::new(),
            subject: String::new(),
            date: String::new(),
            attachments: vec![
                AttachmentPart {
                    filename: "a.pdf".to_string(),
                    size: 6_000_000,
                    mime_type: "application/pdf".to_string(),
                },
                AttachmentPart {
                    filename: "b.zip".to_string(),
                    size: 1_000,
                    mime_type: "application/zip".to_string(),
                },
            ],
        };
        assert_eq!(summary.attachment_count(), 2);
        assert_eq!(summary.total_size(), 6_001_000);
    }

    #[test]
    fn category_counts_serialize_camel_case() {
        let json = serde_json::to_string(&CategoryCounts::default()).unwrap();
        assert!(json.contains("withAttachments"));
    }
}
