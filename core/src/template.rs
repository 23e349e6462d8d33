//! Compose templates for new, reply and forward messages
//!
//! Everything here is pure: the compose view feeds in the previous
//! message body and the user's signature and gets editor HTML back.

use serde::{Deserialize, Serialize};

use crate::message::{Attachment, MessageDetail};

/// Marker line at the top of a forwarded body
pub const FORWARD_MARKER: &str = "---------- Forwarded message ---------";

const REPLY_QUOTE_STYLE: &str =
    "border-left: 2px solid #6f6f6f; background-color: #f7f7f7; padding: 16px 20px";
const FORWARD_QUOTE_STYLE: &str = "background-color: #f7f7f7; padding: 16px 20px";

/// What the compose view was opened for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeAction {
    /// Fresh message, or re-opening a draft
    New,
    /// Reply to a message
    Reply,
    /// Forward a message
    Forward,
}

impl std::fmt::Display for ComposeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeAction::New => write!(f, "new"),
            ComposeAction::Reply => write!(f, "reply"),
            ComposeAction::Forward => write!(f, "forward"),
        }
    }
}

/// Blank lines for the cursor, then `content`
pub fn default_template(content: &str) -> String {
    format!("<p>\n<br/>\n<br/>\n<br/>\n{content}\n</p>")
}

/// Quote `content` and append the signature
pub fn reply_template(content: &str, signature: &str) -> String {
    default_template(&format!(
        "<blockquote style=\"{REPLY_QUOTE_STYLE}\">\n{content}\n</blockquote>\n<br/>\n<br/>\n{signature}"
    ))
}

/// Quote `content` under the forwarded marker and append the signature
pub fn forward_template(content: &str, signature: &str) -> String {
    default_template(&format!(
        "<blockquote style=\"{FORWARD_QUOTE_STYLE}\">\n<p>{FORWARD_MARKER}</p>\n{content}\n</blockquote>\n<br/>\n<br/>\n{signature}\n"
    ))
}

/// Initial editor body for `action`.
///
/// Without a previous body the result is the blank template around the
/// signature. A `New` action with a previous body is a draft being
/// re-opened, so the body is returned untouched.
pub fn compose_body(previous: Option<&str>, signature: Option<&str>, action: ComposeAction) -> String {
    let signature = signature.unwrap_or("");
    match (previous, action) {
        (None, _) => default_template(signature),
        (Some(body), ComposeAction::Reply) => reply_template(body, signature),
        (Some(body), ComposeAction::Forward) => forward_template(body, signature),
        (Some(body), ComposeAction::New) => body.to_string(),
    }
}

/// Subject for the composed message.
///
/// An already matching prefix is kept; a `Re:` subject being forwarded
/// becomes `Fwd:` and a `Fwd:` subject being replied to becomes `Re:`.
pub fn derive_subject(subject: &str, action: ComposeAction) -> String {
    match action {
        ComposeAction::Forward => match subject.strip_prefix("Re:") {
            Some(rest) => format!("Fwd:{rest}"),
            None => subject.to_string(),
        },
        ComposeAction::Reply => match subject.strip_prefix("Fwd:") {
            Some(rest) => format!("Re:{rest}"),
            None => subject.to_string(),
        },
        ComposeAction::New => subject.to_string(),
    }
}

/// Attachment carried over into a compose draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeAttachment {
    /// Filename
    pub filename: String,
    /// MIME type
    pub content_type: String,
    /// Content-ID
    pub cid: String,
    /// `inline` or `attachment`
    pub disposition: &'static str,
    /// Base64 content, `None` until downloaded
    pub content: Option<String>,
}

impl From<&Attachment> for ComposeAttachment {
    fn from(attachment: &Attachment) -> Self {
        Self {
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            cid: attachment.content_id.clone(),
            disposition: attachment.disposition(),
            content: None,
        }
    }
}

/// Prefilled state of the compose view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeDraft {
    /// Why the view was opened
    pub action: ComposeAction,
    /// Subject line
    pub subject: String,
    /// Sender address
    pub from: Option<String>,
    /// Recipients
    pub to: Vec<String>,
    /// CC recipients
    pub cc: Vec<String>,
    /// BCC recipients
    pub bcc: Vec<String>,
    /// Editor HTML
    pub body: String,
    /// Attachments of the source message
    pub attachments: Vec<ComposeAttachment>,
}

impl ComposeDraft {
    /// Build a draft from whatever parts of the source message loaded
    pub fn build(
        action: ComposeAction,
        source: Option<&MessageDetail>,
        previous_body: Option<&str>,
        signature: Option<&str>,
    ) -> Self {
        let body = compose_body(previous_body, signature, action);
        let source = match source {
            Some(source) => source,
            None => {
                return Self {
                    action,
                    subject: String::new(),
                    from: None,
                    to: Vec::new(),
                    cc: Vec::new(),
                    bcc: Vec::new(),
                    body,
                    attachments: Vec::new(),
                }
            }
        };

        let addresses = |list: &[crate::message::AddressInfo]| -> Vec<String> {
            list.iter().map(|a| a.address.clone()).collect()
        };

        Self {
            action,
            subject: derive_subject(&source.subject, action),
            from: Some(source.from.address.clone()),
            to: addresses(&source.to),
            cc: addresses(&source.cc),
            bcc: addresses(&source.bcc),
            body,
            attachments: source.attachments.iter().map(ComposeAttachment::from).collect(),
        }
    }

    /// Whether every attachment has been downloaded
    pub fn attachments_ready(&self) -> bool {
        self.attachments.iter().all(|a| a.content.is_some())
    }
}
