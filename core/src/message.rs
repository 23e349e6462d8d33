//! Message models

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Identified;

/// Message flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFlag {
    /// Message is seen/read
    Seen,
    /// Message is answered
    Answered,
    /// Message is flagged
    Flagged,
    /// Message is deleted
    Deleted,
    /// Message is draft
    Draft,
}

impl std::fmt::Display for MessageFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageFlag::Seen => write!(f, "seen"),
            MessageFlag::Answered => write!(f, "answered"),
            MessageFlag::Flagged => write!(f, "flagged"),
            MessageFlag::Deleted => write!(f, "deleted"),
            MessageFlag::Draft => write!(f, "draft"),
        }
    }
}

/// Whether a flag update adds or removes the flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagAction {
    /// Add the flag
    Add,
    /// Remove the flag
    Del,
}

/// A named mail address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Display name, may be empty
    #[serde(default)]
    pub name: String,
    /// Mail address
    pub address: String,
}

impl std::fmt::Display for AddressInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

/// Render a recipient list the way the message header shows it
pub fn format_recipients(recipients: &[AddressInfo]) -> String {
    recipients
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Message summary as returned by list endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Message identifier
    pub id: String,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Sender
    pub from: Option<AddressInfo>,
    /// Recipients
    #[serde(default)]
    pub to: Vec<AddressInfo>,
    /// Date
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Flags
    #[serde(default)]
    pub flags: Vec<MessageFlag>,
    /// Short plain-text preview
    #[serde(default)]
    pub digest: Option<String>,
}

impl MessageSummary {
    /// Check if message has been read
    pub fn is_seen(&self) -> bool {
        self.flags.contains(&MessageFlag::Seen)
    }

    /// Check if message is flagged
    pub fn is_flagged(&self) -> bool {
        self.flags.contains(&MessageFlag::Flagged)
    }

    /// Copy with a flag added or removed
    pub fn with_flag(&self, flag: MessageFlag, action: FlagAction) -> Self {
        let mut next = self.clone();
        match action {
            FlagAction::Add => {
                if !next.flags.contains(&flag) {
                    next.flags.push(flag);
                }
            }
            FlagAction::Del => next.flags.retain(|f| *f != flag),
        }
        next
    }
}

impl Identified for MessageSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Reference to a message body stored separately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRef {
    /// Text identifier
    pub id: String,
}

/// Attachment metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment identifier
    pub id: String,
    /// Filename
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// Content-ID used by inline references
    #[serde(default)]
    pub content_id: String,
    /// Whether the attachment is displayed inline
    #[serde(default)]
    pub inline: bool,
}

impl Attachment {
    /// Content-Disposition value for re-sending this attachment
    pub fn disposition(&self) -> &'static str {
        if self.inline {
            "inline"
        } else {
            "attachment"
        }
    }
}

/// Full message metadata as returned by the detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDetail {
    /// Message identifier
    pub id: String,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Sender
    pub from: AddressInfo,
    /// Recipients
    #[serde(default)]
    pub to: Vec<AddressInfo>,
    /// CC recipients
    #[serde(default)]
    pub cc: Vec<AddressInfo>,
    /// BCC recipients
    #[serde(default)]
    pub bcc: Vec<AddressInfo>,
    /// Date
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    /// Flags
    #[serde(default)]
    pub flags: Vec<MessageFlag>,
    /// Body reference
    pub text: TextRef,
    /// Attachments
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageText {
    /// HTML body
    #[serde(default)]
    pub html: String,
}

/// Everything the message view renders
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePreview {
    /// Metadata
    pub detail: MessageDetail,
    /// HTML body
    pub html: String,
}
