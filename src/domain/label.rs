//! Label and filter domain types.

use serde::{Deserialize, Serialize};

use super::LabelId;

/// A mailbox label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Provider label id.
    pub id: LabelId,
    /// Display name of the label.
    pub name: String,
    /// Colors for UI display.
    pub color: Option<LabelColor>,
    /// Whether this is a system label (INBOX, SPAM, etc.).
    pub is_system: bool,
}

/// Label color pair, hex format (e.g. `"#fb4c2f"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelColor {
    pub text_color: String,
    pub background_color: String,
}

impl LabelColor {
    /// Creates a color pair after checking both values are `#rrggbb`.
    pub fn new(text: &str, background: &str) -> Option<Self> {
        if is_hex_color(text) && is_hex_color(background) {
            Some(Self {
                text_color: text.to_lowercase(),
                background_color: background.to_lowercase(),
            })
        } else {
            None
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Matching side of a server-side filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_attachment: Option<bool>,
}

/// Action side of a server-side filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterAction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_label_ids: Vec<LabelId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_label_ids: Vec<LabelId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward: Option<String>,
}

/// A filter as stored by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: String,
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub action: FilterAction,
}

/// Well-known system label IDs.
pub mod system_labels {
    use super::LabelId;

    /// Returns the inbox label ID.
    pub fn inbox() -> LabelId {
        LabelId::from("INBOX")
    }

    /// Returns the spam label ID.
    pub fn spam() -> LabelId {
        LabelId::from("SPAM")
    }

    /// Returns the trash label ID.
    pub fn trash() -> LabelId {
        LabelId::from("TRASH")
    }

    /// Returns the unread label ID.
    pub fn unread() -> LabelId {
        LabelId::from("UNREAD")
    }
}
