//! Backend API seam
//!
//! Everything the data layer needs from the Mail3 REST backend goes
//! through [`MailApi`]. [`HttpMailApi`] is the production implementation.

mod http;

pub use http::HttpMailApi;

use async_trait::async_trait;

use crate::alias::{AliasKind, AliasList};
use crate::error::Mail3Result;
use crate::mailbox::Mailbox;
use crate::message::{FlagAction, MessageDetail, MessageFlag, MessageSummary, MessageText};
use crate::types::{CommunityMessage, Cursor, Page, ProfileUpdate, Subscriber, UploadedImage, UserInfo};

/// Mail3 REST operations
#[async_trait]
pub trait MailApi: Send + Sync {
    /// One page of a mailbox, starting at `cursor` (first page when `None`)
    async fn mailbox_messages(
        &self,
        mailbox: Mailbox,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<MessageSummary>>;

    /// Message headers and attachment list
    async fn message_detail(&self, id: &str) -> Mail3Result<MessageDetail>;

    /// Message body by text id
    async fn message_text(&self, text_id: &str) -> Mail3Result<MessageText>;

    /// Raw attachment bytes
    async fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Mail3Result<Vec<u8>>;

    /// Add or remove flags on a message
    async fn flag_message(&self, id: &str, action: FlagAction, flags: &[MessageFlag]) -> Mail3Result<()>;

    /// Move a message to trash, or delete it for good when `permanent`
    async fn delete_message(&self, id: &str, permanent: bool) -> Mail3Result<()>;

    /// Permanently delete several messages
    async fn batch_delete(&self, ids: &[String]) -> Mail3Result<()>;

    /// Move a message to another mailbox
    async fn move_message(&self, id: &str, mailbox: Mailbox) -> Mail3Result<()>;

    /// All aliases of the account
    async fn aliases(&self) -> Mail3Result<AliasList>;

    /// Make `uuid` the default sending alias
    async fn set_default_alias(&self, uuid: &str) -> Mail3Result<()>;

    /// Ask the backend to re-scan the chain for names of `kind`
    async fn refresh_aliases(&self, kind: AliasKind) -> Mail3Result<()>;

    /// Settings of the signed-in account
    async fn user_info(&self) -> Mail3Result<UserInfo>;

    /// Update nickname and avatar
    async fn update_profile(&self, update: &ProfileUpdate) -> Mail3Result<()>;

    /// Upload an image, returning its public URL
    async fn upload_image(&self, filename: &str, bytes: Vec<u8>) -> Mail3Result<UploadedImage>;

    /// One page of sent community messages
    async fn community_messages(
        &self,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<CommunityMessage>>;

    /// One page of community subscribers
    async fn community_subscribers(&self, cursor: Option<&Cursor>, count: u32) -> Mail3Result<Page<Subscriber>>;

    /// Avatar URL for an address, empty when none is set
    async fn avatar(&self, address: &str) -> Mail3Result<String>;

    /// Wallet address behind an ENS or .bit name
    async fn primitive_address(&self, domain: &str) -> Mail3Result<String>;
}
