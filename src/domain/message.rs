//! Message references, raw headers and normalized header sets.

use serde::{Deserialize, Serialize};

use super::{MessageId, ThreadId};

/// Reference to a message owned by the mailbox provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Provider message id.
    pub id: MessageId,
    /// Thread the message belongs to.
    pub thread_id: ThreadId,
}

impl MessageRef {
    /// Creates a new message reference.
    pub fn new(id: impl Into<MessageId>, thread_id: impl Into<ThreadId>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
        }
    }
}

/// A raw header as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name, in whatever case the provider returned it.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl Header {
    /// Creates a header from a name/value pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The headers the cleanup pipelines care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderField {
    From,
    Subject,
    Date,
    ListUnsubscribe,
}

impl HeaderField {
    /// All recognized fields, in request order.
    pub const ALL: [HeaderField; 4] = [
        HeaderField::From,
        HeaderField::Subject,
        HeaderField::Date,
        HeaderField::ListUnsubscribe,
    ];

    /// Canonical header name as sent in metadata requests.
    pub fn header_name(self) -> &'static str {
        match self {
            HeaderField::From => "From",
            HeaderField::Subject => "Subject",
            HeaderField::Date => "Date",
            HeaderField::ListUnsubscribe => "List-Unsubscribe",
        }
    }
}

/// Normalized view of a message's headers.
///
/// Always carries all four recognized fields; a header that is missing from
/// the message is represented by an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSet {
    pub from: String,
    pub subject: String,
    pub date: String,
    pub list_unsubscribe: String,
}

impl HeaderSet {
    /// Extracts the recognized fields from a raw header collection.
    ///
    /// Header names are compared case-insensitively. When a header occurs
    /// more than once the first occurrence wins.
    pub fn extract(headers: &[Header]) -> Self {
        let lookup = |field: HeaderField| {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(field.header_name()))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };

        Self {
            from: lookup(HeaderField::From),
            subject: lookup(HeaderField::Subject),
            date: lookup(HeaderField::Date),
            list_unsubscribe: lookup(HeaderField::ListUnsubscribe),
        }
    }

    /// Returns the value of a recognized field.
    pub fn get(&self, field: HeaderField) -> &str {
        match field {
            HeaderField::From => &self.from,
            HeaderField::Subject => &self.subject,
            HeaderField::Date => &self.date,
            HeaderField::ListUnsubscribe => &self.list_unsubscribe,
        }
    }
}

/// A message reference together with its normalized headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub reference: MessageRef,
    pub headers: HeaderSet,
}

impl MessageMetadata {
    /// Builds metadata from a reference and the provider's raw headers.
    pub fn from_headers(reference: MessageRef, headers: &[Header]) -> Self {
        Self {
            reference,
            headers: HeaderSet::extract(headers),
        }
    }
}
