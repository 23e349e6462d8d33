//! Mailbox identifiers

use serde::{Deserialize, Serialize};

/// Server-side mailboxes exposed by the webmail views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mailbox {
    /// Inbox
    #[serde(rename = "INBOX")]
    Inbox,
    /// Sent mail
    Sent,
    /// Drafts
    Drafts,
    /// Trash
    Trash,
    /// Spam
    Spam,
}

impl Mailbox {
    /// Name used in API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Mailbox::Inbox => "INBOX",
            Mailbox::Sent => "Sent",
            Mailbox::Drafts => "Drafts",
            Mailbox::Trash => "Trash",
            Mailbox::Spam => "Spam",
        }
    }

    /// Mailbox with API name `name`
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Mailbox::Inbox,
            Mailbox::Sent,
            Mailbox::Drafts,
            Mailbox::Trash,
            Mailbox::Spam,
        ]
        .into_iter()
        .find(|m| m.as_str() == name)
    }

    /// Messages in this mailbox can be restored to the inbox
    pub fn is_restorable(&self) -> bool {
        matches!(self, Mailbox::Trash | Mailbox::Spam)
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
