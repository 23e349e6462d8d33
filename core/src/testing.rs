//! In-memory backend and notification sink for unit tests

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::macros::datetime;

use crate::alias::{Alias, AliasKind, AliasList};
use crate::api::MailApi;
use crate::error::{Mail3Error, Mail3Result};
use crate::mailbox::Mailbox;
use crate::message::{
    AddressInfo, Attachment, FlagAction, MessageDetail, MessageFlag, MessageSummary, MessageText, TextRef,
};
use crate::notify::{Notification, Notifier};
use crate::types::{
    CommunityMessage, Cursor, Page, ProfileUpdate, Subscriber, UploadedImage, UserInfo,
};

pub const WALLET: &str = "0x17EFDCcfc61a03aE6620F35e502215edde20c13d";

pub fn alias(uuid: &str, address: &str, is_default: bool) -> Alias {
    Alias {
        uuid: uuid.to_string(),
        address: address.to_string(),
        is_default,
    }
}

pub fn detail(id: &str) -> MessageDetail {
    MessageDetail {
        id: id.to_string(),
        subject: format!("Subject {id}"),
        from: AddressInfo {
            name: "Alice".to_string(),
            address: "alice@mail3.me".to_string(),
        },
        to: vec![AddressInfo {
            name: String::new(),
            address: format!("{WALLET}@mail3.me"),
        }],
        cc: Vec::new(),
        bcc: Vec::new(),
        date: datetime!(2022-06-07 10:00 UTC),
        flags: Vec::new(),
        text: TextRef {
            id: format!("text-{id}"),
        },
        attachments: Vec::new(),
    }
}

pub fn attachment(id: &str, filename: &str) -> Attachment {
    Attachment {
        id: id.to_string(),
        filename: filename.to_string(),
        content_type: "application/octet-stream".to_string(),
        content_id: format!("cid-{id}"),
        inline: false,
    }
}

fn summary_of(detail: &MessageDetail) -> MessageSummary {
    MessageSummary {
        id: detail.id.clone(),
        subject: detail.subject.clone(),
        from: Some(detail.from.clone()),
        to: detail.to.clone(),
        date: detail.date,
        flags: detail.flags.clone(),
        digest: None,
    }
}

/// Error a fake operation fails with
#[derive(Clone)]
struct Failure {
    status: u16,
    body: String,
}

#[derive(Default)]
struct FakeState {
    mailboxes: HashMap<Mailbox, Vec<MessageSummary>>,
    details: HashMap<String, MessageDetail>,
    texts: HashMap<String, String>,
    attachments: HashMap<(String, String), Vec<u8>>,
    aliases: Vec<Alias>,
    user: UserInfo,
    community: Vec<CommunityMessage>,
    subscribers: Vec<Subscriber>,
}

/// Backend kept in memory, with per-operation call counters and
/// injectable failures
#[derive(Default)]
pub struct FakeMailApi {
    state: Mutex<FakeState>,
    failures: Mutex<HashMap<String, Failure>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Duration>,
    in_flight: Mutex<(usize, usize)>,
}

impl FakeMailApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail with `status` and an optional backend reason
    pub fn fail(&self, op: &str, status: u16, reason: Option<&str>) {
        let body = match reason {
            Some(reason) => format!(r#"{{"reason":"{reason}"}}"#),
            None => String::new(),
        };
        self.failures.lock().insert(op.to_string(), Failure { status, body });
    }

    /// Make `op` succeed again
    pub fn recover(&self, op: &str) {
        self.failures.lock().remove(op);
    }

    /// Delay applied to every call
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    /// Calls made to any operation
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Most calls that were in flight at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.in_flight.lock().1
    }

    pub fn add_message(&self, mailbox: Mailbox, detail: MessageDetail, html: &str) {
        let mut state = self.state.lock();
        state
            .mailboxes
            .entry(mailbox)
            .or_default()
            .push(summary_of(&detail));
        state.texts.insert(detail.text.id.clone(), html.to_string());
        state.details.insert(detail.id.clone(), detail);
    }

    pub fn add_attachment(&self, message_id: &str, attachment_id: &str, bytes: &[u8]) {
        self.state
            .lock()
            .attachments
            .insert((message_id.to_string(), attachment_id.to_string()), bytes.to_vec());
    }

    pub fn set_aliases(&self, aliases: Vec<Alias>) {
        self.state.lock().aliases = aliases;
    }

    pub fn set_user(&self, user: UserInfo) {
        self.state.lock().user = user;
    }

    pub fn user(&self) -> UserInfo {
        self.state.lock().user.clone()
    }

    pub fn add_subscribers(&self, addresses: &[&str]) {
        self.state
            .lock()
            .subscribers
            .extend(addresses.iter().map(|a| Subscriber(a.to_string())));
    }

    pub fn mailbox_ids(&self, mailbox: Mailbox) -> Vec<String> {
        self.state
            .lock()
            .mailboxes
            .get(&mailbox)
            .map(|m| m.iter().map(|s| s.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Whole mailbox as a single last page
    pub fn first_page(&self, mailbox: Mailbox) -> Page<MessageSummary> {
        let items = self
            .state
            .lock()
            .mailboxes
            .get(&mailbox)
            .cloned()
            .unwrap_or_default();
        Page::new(items, Cursor::default())
    }

    async fn enter(&self, op: &str) -> Mail3Result<()> {
        *self.calls.lock().entry(op.to_string()).or_default() += 1;
        {
            let mut in_flight = self.in_flight.lock();
            in_flight.0 += 1;
            in_flight.1 = in_flight.1.max(in_flight.0);
        }
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.lock().0 -= 1;
        match self.failures.lock().get(op) {
            Some(failure) => Err(Mail3Error::from_response(failure.status, &failure.body)),
            None => Ok(()),
        }
    }

    /// Offset-based paging; the cursor is the index of the first item
    fn page<T: Clone>(items: &[T], cursor: Option<&Cursor>, count: u32) -> Page<T> {
        let start: usize = cursor.and_then(|c| c.as_str().parse().ok()).unwrap_or(0);
        let end = (start + count as usize).min(items.len());
        let next = if end < items.len() {
            Cursor::new(end.to_string())
        } else {
            Cursor::default()
        };
        Page::new(items[start.min(end)..end].to_vec(), next)
    }

    fn remove_everywhere(state: &mut FakeState, id: &str) -> Option<MessageSummary> {
        let mut removed = None;
        for messages in state.mailboxes.values_mut() {
            if let Some(pos) = messages.iter().position(|m| m.id == id) {
                removed = Some(messages.remove(pos));
            }
        }
        removed
    }
}

#[async_trait]
impl MailApi for FakeMailApi {
    async fn mailbox_messages(
        &self,
        mailbox: Mailbox,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<MessageSummary>> {
        self.enter("mailbox_messages").await?;
        let state = self.state.lock();
        let items = state.mailboxes.get(&mailbox).cloned().unwrap_or_default();
        Ok(Self::page(&items, cursor, count))
    }

    async fn message_detail(&self, id: &str) -> Mail3Result<MessageDetail> {
        self.enter("message_detail").await?;
        self.state
            .lock()
            .details
            .get(id)
            .cloned()
            .ok_or_else(|| Mail3Error::not_found(format!("message {id}")))
    }

    async fn message_text(&self, text_id: &str) -> Mail3Result<MessageText> {
        self.enter("message_text").await?;
        let html = self
            .state
            .lock()
            .texts
            .get(text_id)
            .cloned()
            .ok_or_else(|| Mail3Error::not_found(format!("text {text_id}")))?;
        Ok(MessageText { html })
    }

    async fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Mail3Result<Vec<u8>> {
        self.enter("download_attachment").await?;
        self.state
            .lock()
            .attachments
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| Mail3Error::not_found(format!("attachment {attachment_id}")))
    }

    async fn flag_message(&self, id: &str, action: FlagAction, flags: &[MessageFlag]) -> Mail3Result<()> {
        self.enter("flag_message").await?;
        let mut state = self.state.lock();
        for messages in state.mailboxes.values_mut() {
            for message in messages.iter_mut().filter(|m| m.id == id) {
                for flag in flags {
                    *message = message.with_flag(*flag, action);
                }
            }
        }
        Ok(())
    }

    async fn delete_message(&self, id: &str, permanent: bool) -> Mail3Result<()> {
        self.enter("delete_message").await?;
        let mut state = self.state.lock();
        let removed = Self::remove_everywhere(&mut state, id)
            .ok_or_else(|| Mail3Error::not_found(format!("message {id}")))?;
        if !permanent {
            state.mailboxes.entry(Mailbox::Trash).or_default().push(removed);
        }
        Ok(())
    }

    async fn batch_delete(&self, ids: &[String]) -> Mail3Result<()> {
        self.enter("batch_delete").await?;
        let mut state = self.state.lock();
        for id in ids {
            Self::remove_everywhere(&mut state, id);
        }
        Ok(())
    }

    async fn move_message(&self, id: &str, mailbox: Mailbox) -> Mail3Result<()> {
        self.enter("move_message").await?;
        let mut state = self.state.lock();
        let moved = Self::remove_everywhere(&mut state, id)
            .ok_or_else(|| Mail3Error::not_found(format!("message {id}")))?;
        state.mailboxes.entry(mailbox).or_default().push(moved);
        Ok(())
    }

    async fn aliases(&self) -> Mail3Result<AliasList> {
        self.enter("aliases").await?;
        Ok(AliasList {
            aliases: self.state.lock().aliases.clone(),
        })
    }

    async fn set_default_alias(&self, uuid: &str) -> Mail3Result<()> {
        self.enter("set_default_alias").await?;
        for alias in self.state.lock().aliases.iter_mut() {
            alias.is_default = alias.uuid == uuid;
        }
        Ok(())
    }

    async fn refresh_aliases(&self, kind: AliasKind) -> Mail3Result<()> {
        self.enter("refresh_aliases").await?;
        if !kind.is_refreshable() {
            return Err(Mail3Error::validation(format!("{kind} aliases cannot be refreshed")));
        }
        Ok(())
    }

    async fn user_info(&self) -> Mail3Result<UserInfo> {
        self.enter("user_info").await?;
        Ok(self.state.lock().user.clone())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Mail3Result<()> {
        self.enter("update_profile").await?;
        let mut state = self.state.lock();
        state.user.nickname = update.nickname.clone();
        state.user.avatar = update.avatar.clone();
        Ok(())
    }

    async fn upload_image(&self, filename: &str, _bytes: Vec<u8>) -> Mail3Result<UploadedImage> {
        self.enter("upload_image").await?;
        Ok(UploadedImage {
            url: format!("https://cdn.mail3.me/{filename}"),
        })
    }

    async fn community_messages(
        &self,
        cursor: Option<&Cursor>,
        count: u32,
    ) -> Mail3Result<Page<CommunityMessage>> {
        self.enter("community_messages").await?;
        Ok(Self::page(&self.state.lock().community, cursor, count))
    }

    async fn community_subscribers(&self, cursor: Option<&Cursor>, count: u32) -> Mail3Result<Page<Subscriber>> {
        self.enter("community_subscribers").await?;
        Ok(Self::page(&self.state.lock().subscribers, cursor, count))
    }

    async fn avatar(&self, address: &str) -> Mail3Result<String> {
        self.enter("avatar").await?;
        Ok(format!("https://cdn.mail3.me/avatar/{address}.png"))
    }

    async fn primitive_address(&self, domain: &str) -> Mail3Result<String> {
        self.enter("primitive_address").await?;
        if domain.ends_with(".eth") || domain.ends_with(".bit") {
            Ok(WALLET.to_string())
        } else {
            Err(Mail3Error::from_response(404, r#"{"reason":"USER_NOT_FOUND"}"#))
        }
    }
}

/// Notifier that keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.notifications.lock().iter().map(|n| n.key.clone()).collect()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}
