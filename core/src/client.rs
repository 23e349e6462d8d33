//! Entry point tying configuration, backend, cache and mutator together

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::alias::AliasBook;
use crate::api::{HttpMailApi, MailApi};
use crate::config::Config;
use crate::error::Mail3Result;
use crate::mailbox::Mailbox;
use crate::message::MessageSummary;
use crate::mutation::Mutator;
use crate::notify::{AutoConfirm, Confirmer, LogNotifier, Notifier};
use crate::query::{
    load_aliases, load_preview, load_user_info, ops, DetailFetcher, PaginatedList, QueryCache, QueryKey,
    QueryOptions, RefetchTrigger,
};
use crate::template::{ComposeAction, ComposeDraft};
use crate::types::{CommunityMessage, Cursor, Subscriber, UserInfo};
use crate::view::ViewScope;

/// Client-side data layer for one signed-in account
pub struct MailClient {
    config: Config,
    api: Arc<dyn MailApi>,
    cache: Arc<QueryCache>,
    options: QueryOptions,
    mutator: Mutator,
}

impl MailClient {
    /// Create a client over an arbitrary backend
    pub fn new(
        config: Config,
        api: Arc<dyn MailApi>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new());
        let options = QueryOptions::from_config(&config.query);
        let mutator = Mutator::new(
            api.clone(),
            cache.clone(),
            notifier,
            confirmer,
            config.mutation.consistency,
            options.clone(),
        );
        Self {
            config,
            api,
            cache,
            options,
            mutator,
        }
    }

    /// Client talking to the configured server over HTTP, reporting
    /// through the log and confirming every destructive action
    pub fn connect(config: Config) -> Mail3Result<Self> {
        config.validate()?;
        let api = HttpMailApi::new(&config.server)?;
        info!("Connecting to {}", config.server.base_url);
        Ok(Self::new(config, Arc::new(api), Arc::new(LogNotifier), Arc::new(AutoConfirm)))
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared query cache
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Mutation runner
    pub fn mutator(&self) -> &Mutator {
        &self.mutator
    }

    /// Paginated view of a mailbox
    pub fn mailbox(&self, mailbox: Mailbox) -> PaginatedList<MessageSummary> {
        let api = self.api.clone();
        let count = self.config.query.page_size;
        PaginatedList::new(
            self.cache.clone(),
            QueryKey::new(ops::MAILBOX_MESSAGES).param(mailbox.as_str()),
            self.options.clone(),
            Arc::new(move |cursor: Option<Cursor>| {
                let api = api.clone();
                async move { api.mailbox_messages(mailbox, cursor.as_ref(), count).await }.boxed()
            }),
        )
    }

    /// Paginated list of sent community messages
    pub fn community_messages(&self) -> PaginatedList<CommunityMessage> {
        let api = self.api.clone();
        let count = self.config.query.page_size;
        PaginatedList::new(
            self.cache.clone(),
            QueryKey::new(ops::COMMUNITY_MESSAGES),
            self.options.clone(),
            Arc::new(move |cursor: Option<Cursor>| {
                let api = api.clone();
                async move { api.community_messages(cursor.as_ref(), count).await }.boxed()
            }),
        )
    }

    /// Paginated list of community subscribers
    pub fn subscribers(&self) -> PaginatedList<Subscriber> {
        let api = self.api.clone();
        let count = self.config.query.page_size;
        PaginatedList::new(
            self.cache.clone(),
            QueryKey::new(ops::SUBSCRIBERS),
            self.options.clone(),
            Arc::new(move |cursor: Option<Cursor>| {
                let api = api.clone();
                async move { api.community_subscribers(cursor.as_ref(), count).await }.boxed()
            }),
        )
    }

    /// Fetcher for one message, owned by the view behind `scope`
    pub fn open_message(&self, id: &str, scope: ViewScope) -> DetailFetcher {
        DetailFetcher::new(self.api.clone(), self.cache.clone(), self.options.clone(), id, scope)
    }

    /// Alias book of the account
    pub async fn aliases(&self, trigger: RefetchTrigger) -> Mail3Result<Arc<AliasBook>> {
        load_aliases(&self.cache, &self.api, &self.options, trigger).await
    }

    /// Account settings
    pub async fn user_info(&self, trigger: RefetchTrigger) -> Mail3Result<Arc<UserInfo>> {
        load_user_info(&self.cache, &self.api, &self.options, trigger).await
    }

    /// Avatar URL of an address
    pub async fn avatar(&self, address: &str) -> Mail3Result<Arc<String>> {
        let key = QueryKey::new(ops::AVATAR).param(address);
        self.cache
            .fetch_query(&key, &self.options, RefetchTrigger::Mount, || self.api.avatar(address))
            .await
    }

    /// Wallet address an ENS or .bit name resolves to
    pub async fn primitive_address(&self, domain: &str) -> Mail3Result<Arc<String>> {
        let key = QueryKey::new(ops::PRIMITIVE_ADDRESS).param(domain);
        self.cache
            .fetch_query(&key, &self.options, RefetchTrigger::Mount, || {
                self.api.primitive_address(domain)
            })
            .await
    }

    /// Prefill the compose view.
    ///
    /// `source` is the message being replied to, forwarded or re-opened as
    /// a draft. Every part is best effort: a source that fails to load
    /// gives an empty draft, a failed user lookup drops the signature and
    /// a failed download leaves that attachment without content.
    pub async fn compose(&self, source: Option<&str>, action: ComposeAction) -> ComposeDraft {
        let preview = async {
            match source {
                Some(id) => load_preview(&self.cache, &self.api, &self.options, RefetchTrigger::Mount, id)
                    .await
                    .map_err(|e| warn!("Failed to load message {} for compose: {}", id, e))
                    .ok(),
                None => None,
            }
        };
        let user = async {
            self.user_info(RefetchTrigger::Mount)
                .await
                .map_err(|e| warn!("Failed to load signature: {}", e))
                .ok()
        };
        let (preview, user) = futures::join!(preview, user);

        let signature = user
            .as_ref()
            .filter(|u| u.signature_status.includes_text())
            .map(|u| u.text_signature.as_str());
        let mut draft = ComposeDraft::build(
            action,
            preview.as_ref().map(|p| &p.detail),
            preview.as_ref().map(|p| p.html.as_str()),
            signature,
        );

        if let Some(preview) = &preview {
            let message_id = preview.detail.id.as_str();
            let downloads = preview.detail.attachments.iter().map(|attachment| async move {
                match self.api.download_attachment(message_id, &attachment.id).await {
                    Ok(bytes) => Some(BASE64.encode(bytes)),
                    Err(e) => {
                        warn!("Failed to download attachment {}: {}", attachment.filename, e);
                        None
                    }
                }
            });
            let contents = join_all(downloads).await;
            for (attachment, content) in draft.attachments.iter_mut().zip(contents) {
                attachment.content = content;
            }
        }

        debug!("Compose draft ready: {} ({} attachments)", action, draft.attachments.len());
        draft
    }
}
