//! Domain layer types for mailsweep.
//!
//! Message references and header sets, the cleanup pipeline's groups and
//! results, labels and filters, and mailbox overview types.

mod cleanup;
mod label;
mod message;
mod scan;
mod types;

pub use cleanup::{
    GroupResult, GroupStatus, LinkScheme, Progress, RunStats, SenderGroup, UnsubscribeLink,
};
pub use label::{system_labels, Filter, FilterAction, FilterCriteria, Label, LabelColor};
pub use message::{Header, HeaderField, HeaderSet, MessageMetadata, MessageRef};
pub use scan::{
    AttachmentPart, AttachmentSummary, CategoryCounts, DuplicateCleanup, MailboxProfile,
    MailboxScan,
};
pub use types::{LabelId, MessageId, RunId, ThreadId};
