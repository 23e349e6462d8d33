//! Shared wire types

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Opaque pagination token returned by list endpoints.
///
/// An empty cursor in a response marks the end of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this cursor marks the end of the list
    pub fn is_end(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Items with a stable identifier
pub trait Identified {
    /// Stable identifier
    fn id(&self) -> &str;
}

/// One page of a paginated list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items in this page; endpoints name this field after the entity
    #[serde(
        alias = "messages",
        alias = "subscribers",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub items: Vec<T>,
    /// Token for the next page, empty on the last page
    #[serde(default)]
    pub next_cursor: Cursor,
}

impl<T> Page<T> {
    /// Build a page
    pub fn new(items: Vec<T>, next_cursor: Cursor) -> Self {
        Self { items, next_cursor }
    }

    /// Whether this is the last page
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_end()
    }
}

impl<T: Identified + Clone> Page<T> {
    /// Copy of this page without the given ids
    pub fn without(&self, ids: &[String]) -> Self {
        Self {
            items: self
                .items
                .iter()
                .filter(|item| !ids.iter().any(|id| id == item.id()))
                .cloned()
                .collect(),
            next_cursor: self.next_cursor.clone(),
        }
    }

    /// Items of this page whose id is in `ids`, with their positions
    pub fn positions_of(&self, ids: &[String]) -> Vec<(usize, T)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| ids.iter().any(|id| id == item.id()))
            .map(|(index, item)| (index, item.clone()))
            .collect()
    }

    /// Copy of this page with `removed` put back where it was.
    ///
    /// Positions are clamped to the page length; items already present
    /// are skipped.
    pub fn with_restored(&self, removed: &[(usize, T)]) -> Self {
        let mut items = self.items.clone();
        for (index, item) in removed {
            if items.iter().any(|i| i.id() == item.id()) {
                continue;
            }
            items.insert((*index).min(items.len()), item.clone());
        }
        Self {
            items,
            next_cursor: self.next_cursor.clone(),
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Which signature blocks the user has enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// No signature
    Disabled,
    /// Text signature only
    OnlyText,
    /// Card image only
    OnlyImage,
    /// Text and card image
    BothEnabled,
}

impl SignatureStatus {
    /// Whether the text signature should be appended to composed mail
    pub fn includes_text(&self) -> bool {
        matches!(self, Self::OnlyText | Self::BothEnabled)
    }
}

impl Default for SignatureStatus {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Account settings returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Display nickname
    #[serde(default)]
    pub nickname: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar: String,
    /// HTML text signature
    #[serde(default)]
    pub text_signature: String,
    /// Enabled signature blocks
    #[serde(default)]
    pub signature_status: SignatureStatus,
}

/// Profile update request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
    /// New nickname
    pub nickname: String,
    /// New avatar URL
    pub avatar: String,
}

/// Result of an image upload
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    /// Hosted URL of the uploaded file
    pub url: String,
}

/// Message posted by a community to its subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMessage {
    /// Message identifier
    pub uuid: String,
    /// Subject line
    pub subject: String,
    /// Creation time
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Number of subscribers who opened it
    #[serde(default)]
    pub read_count: u64,
}

impl Identified for CommunityMessage {
    fn id(&self) -> &str {
        &self.uuid
    }
}

/// A subscriber's wallet address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subscriber(pub String);

impl Identified for Subscriber {
    fn id(&self) -> &str {
        &self.0
    }
}
