//! Single message fetcher

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use super::{ops, QueryCache, QueryKey, QueryOptions, RefetchTrigger};
use crate::api::MailApi;
use crate::error::{Mail3Error, Mail3Result};
use crate::message::{FlagAction, MessageFlag, MessagePreview, MessageSummary};
use crate::types::Page;
use crate::view::ViewScope;

/// Message detail and body, through the cache
pub(crate) async fn load_preview(
    cache: &QueryCache,
    api: &Arc<dyn MailApi>,
    options: &QueryOptions,
    trigger: RefetchTrigger,
    id: &str,
) -> Mail3Result<Arc<MessagePreview>> {
    let key = QueryKey::new(ops::MESSAGE_PREVIEW).param(id);
    cache
        .fetch_query(&key, options, trigger, || async {
            let detail = api.message_detail(id).await?;
            let text = api.message_text(&detail.text.id).await?;
            Ok(MessagePreview {
                detail,
                html: text.html,
            })
        })
        .await
}

/// Mark `id` seen in every cached mailbox page
fn patch_seen(cache: &QueryCache, id: &str) {
    for key in cache.keys_for_operation(ops::MAILBOX_MESSAGES) {
        cache.update_query_data::<Page<MessageSummary>, _>(&key, |page| Page {
            items: page
                .items
                .iter()
                .map(|m| {
                    if m.id == id {
                        m.with_flag(MessageFlag::Seen, FlagAction::Add)
                    } else {
                        m.clone()
                    }
                })
                .collect(),
            next_cursor: page.next_cursor.clone(),
        });
    }
}

/// Holds the cached preview of one message for one view
struct PreviewLease {
    cache: Arc<QueryCache>,
    key: QueryKey,
    released: AtomicBool,
}

impl PreviewLease {
    fn new(cache: Arc<QueryCache>, key: QueryKey) -> Self {
        cache.observe(&key);
        Self {
            cache,
            key,
            released: AtomicBool::new(false),
        }
    }

    /// Stop observing the preview and drop it unless another view shows it
    fn discard(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.cache.release(&self.key);
        }
        self.cache.remove_unobserved(&self.key);
    }
}

impl Drop for PreviewLease {
    fn drop(&mut self) {
        self.discard();
    }
}

/// Loads one message for one mounted view.
///
/// The message is loaded at most once per fetcher; focus and reconnect
/// events never reload it. A successful load marks the message seen in
/// the background. The body is dropped from the cache when the view
/// unmounts or the fetcher is dropped, unless another view still shows it.
pub struct DetailFetcher {
    api: Arc<dyn MailApi>,
    cache: Arc<QueryCache>,
    options: QueryOptions,
    id: String,
    scope: ViewScope,
    loaded: OnceCell<Arc<MessagePreview>>,
    lease: Arc<PreviewLease>,
    _watch: DropGuard,
}

impl DetailFetcher {
    /// Fetcher for message `id`, owned by the view behind `scope`.
    ///
    /// Spawns a watcher for the unmount, so it must run inside a tokio runtime.
    pub fn new(
        api: Arc<dyn MailApi>,
        cache: Arc<QueryCache>,
        options: QueryOptions,
        id: impl Into<String>,
        scope: ViewScope,
    ) -> Self {
        let id = id.into();
        let lease = Arc::new(PreviewLease::new(
            cache.clone(),
            QueryKey::new(ops::MESSAGE_PREVIEW).param(id.as_str()),
        ));

        let dropped = CancellationToken::new();
        let watch = Arc::downgrade(&lease);
        let view = scope.clone();
        let stop = dropped.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = view.unmounted() => {
                    if let Some(lease) = watch.upgrade() {
                        lease.discard();
                    }
                }
                _ = stop.cancelled() => {}
            }
        });

        Self {
            api,
            cache,
            options,
            id,
            scope,
            loaded: OnceCell::new(),
            lease,
            _watch: dropped.drop_guard(),
        }
    }

    /// Message id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The loaded message, if any
    pub fn current(&self) -> Option<Arc<MessagePreview>> {
        self.loaded.get().cloned()
    }

    /// Load the message, or return the already loaded one.
    ///
    /// Fails with [`Mail3Error::ViewUnmounted`](crate::Mail3Error::ViewUnmounted)
    /// when the view went away before the load finished; the result is then
    /// dropped and the message is not marked seen.
    pub async fn load(&self) -> Mail3Result<Arc<MessagePreview>> {
        let preview = self
            .loaded
            .get_or_try_init(|| async {
                let preview = self
                    .guarded(load_preview(
                        &self.cache,
                        &self.api,
                        &self.options,
                        RefetchTrigger::Mount,
                        &self.id,
                    ))
                    .await?;
                self.mark_seen();
                Ok::<_, Mail3Error>(preview)
            })
            .await?;
        Ok(preview.clone())
    }

    /// React to a refetch event. Only a manual refresh reloads.
    pub async fn refetch(&self, trigger: RefetchTrigger) -> Mail3Result<Arc<MessagePreview>> {
        match (trigger, self.loaded.get()) {
            (RefetchTrigger::Manual, Some(_)) => {
                let preview = self
                    .guarded(load_preview(&self.cache, &self.api, &self.options, trigger, &self.id))
                    .await?;
                Ok(preview)
            }
            (_, Some(preview)) => {
                debug!("Ignoring {:?} for loaded message {}", trigger, self.id);
                Ok(preview.clone())
            }
            (_, None) => self.load().await,
        }
    }

    /// Scope-checked load; a body that lands after unmount is dropped again
    async fn guarded<F>(&self, fut: F) -> Mail3Result<Arc<MessagePreview>>
    where
        F: Future<Output = Mail3Result<Arc<MessagePreview>>>,
    {
        let result = self.scope.guard(fut).await;
        if matches!(result, Err(Mail3Error::ViewUnmounted)) {
            self.lease.discard();
        }
        result
    }

    fn mark_seen(&self) {
        let api = self.api.clone();
        let cache = self.cache.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            match api.flag_message(&id, FlagAction::Add, &[MessageFlag::Seen]).await {
                Ok(()) => patch_seen(&cache, &id),
                Err(e) => warn!("Failed to mark message {} as seen: {}", id, e),
            }
        });
    }
}
