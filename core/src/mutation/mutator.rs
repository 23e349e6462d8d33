//! Mutation runner

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CachePatch, MutationKind, MutationOutcome, MutationState, Revert};
use crate::alias::{AliasBook, AliasKind};
use crate::api::MailApi;
use crate::config::ConsistencyMode;
use crate::error::{ErrorCode, Mail3Error, Mail3Result};
use crate::locks::KeyedLocks;
use crate::mailbox::Mailbox;
use crate::message::MessageSummary;
use crate::notify::{ConfirmPrompt, Confirmer, Notification, Notifier};
use crate::query::{load_aliases, ops, QueryCache, QueryKey, QueryOptions, RefetchTrigger};
use crate::types::{Page, ProfileUpdate, UserInfo};
use crate::MAX_AVATAR_SIZE;

/// Image picked as the new avatar
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    /// Original filename
    pub filename: String,
    /// Image bytes
    pub bytes: Vec<u8>,
}

/// Notification keys of one mutation
struct Messages {
    ok: Option<&'static str>,
    fail: &'static str,
}

fn is_valid_nickname(nickname: &str) -> bool {
    static NICKNAME: OnceLock<Option<Regex>> = OnceLock::new();
    NICKNAME
        .get_or_init(|| Regex::new("^[0-9a-zA-Z_]{1,16}$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(nickname))
}

/// Runs mutations against the backend and keeps the cache in step.
///
/// Under [`ConsistencyMode::ConfirmFirst`] the cache is patched only once
/// the backend confirms. Under [`ConsistencyMode::Optimistic`] it is
/// patched up front and the patch is reverted if the call fails. A revert
/// only undoes its own mutation, so concurrent mutations that touched the
/// same page keep their changes.
pub struct Mutator {
    api: Arc<dyn MailApi>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    consistency: ConsistencyMode,
    options: QueryOptions,
    entity_locks: KeyedLocks<String>,
    pending: Mutex<HashMap<Uuid, MutationKind>>,
}

impl Mutator {
    /// Create a mutator
    pub fn new(
        api: Arc<dyn MailApi>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
        confirmer: Arc<dyn Confirmer>,
        consistency: ConsistencyMode,
        options: QueryOptions,
    ) -> Self {
        Self {
            api,
            cache,
            notifier,
            confirmer,
            consistency,
            options,
            entity_locks: KeyedLocks::default(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Consistency mode in effect
    pub fn consistency(&self) -> ConsistencyMode {
        self.consistency
    }

    /// Mutations waiting for the backend
    pub fn pending(&self) -> Vec<(Uuid, MutationKind)> {
        self.pending
            .lock()
            .iter()
            .map(|(id, kind)| (*id, kind.clone()))
            .collect()
    }

    /// Move a message to trash
    pub async fn trash(&self, id: &str) -> MutationOutcome {
        let kind = MutationKind::Trash { id: id.to_string() };
        let patch = self.remove_messages_patch(vec![id.to_string()]);
        let call = self.api.delete_message(id, false);
        self.run(
            kind,
            Some(patch),
            vec![QueryKey::new(ops::MAILBOX_MESSAGES)],
            Messages {
                ok: Some("status.trash.ok"),
                fail: "status.trash.fail",
            },
            call,
        )
        .await
    }

    /// Delete a message for good, after the user confirms.
    ///
    /// Returns `None` when the user declines.
    pub async fn delete_permanently(&self, id: &str) -> Option<MutationOutcome> {
        let kind = MutationKind::PermanentDelete { id: id.to_string() };
        if !self.confirm(&kind, ConfirmPrompt::new("confirm.delete.title", "confirm.delete.description")) {
            return None;
        }
        let patch = self.remove_messages_patch(vec![id.to_string()]);
        let call = self.api.delete_message(id, true);
        let outcome = self
            .run(
                kind,
                Some(patch),
                vec![
                    QueryKey::new(ops::MAILBOX_MESSAGES),
                    QueryKey::new(ops::MESSAGE_PREVIEW).param(id),
                ],
                Messages {
                    ok: Some("status.delete.ok"),
                    fail: "status.delete.fail",
                },
                call,
            )
            .await;
        Some(outcome)
    }

    /// Delete several messages for good, after the user confirms
    pub async fn batch_delete(&self, ids: &[String]) -> Option<MutationOutcome> {
        let kind = MutationKind::BatchDelete { ids: ids.to_vec() };
        if ids.is_empty() {
            debug!("Nothing selected for batch delete");
            return None;
        }
        if !self.confirm(&kind, ConfirmPrompt::new("confirm.delete.title", "confirm.delete.description")) {
            return None;
        }
        let patch = self.remove_messages_patch(ids.to_vec());
        let call = self.api.batch_delete(ids);
        let outcome = self
            .run(
                kind,
                Some(patch),
                vec![QueryKey::new(ops::MAILBOX_MESSAGES)],
                Messages {
                    ok: Some("status.batch_delete.ok"),
                    fail: "status.batch_delete.fail",
                },
                call,
            )
            .await;
        Some(outcome)
    }

    /// Move a message out of trash or spam into the inbox.
    ///
    /// A message cached in any other mailbox is refused without a call.
    pub async fn restore(&self, id: &str) -> MutationOutcome {
        let kind = MutationKind::Restore { id: id.to_string() };
        if let Some(source) = self.cached_mailbox_of(id) {
            if !source.is_restorable() {
                let error = Mail3Error::validation(format!("Cannot restore from {source}"));
                return self.reject(kind, "restore-failed", error);
            }
        }
        let patch = self.remove_messages_patch(vec![id.to_string()]);
        let call = self.api.move_message(id, Mailbox::Inbox);
        self.run(
            kind,
            Some(patch),
            vec![QueryKey::new(ops::MAILBOX_MESSAGES)],
            Messages {
                ok: None,
                fail: "restore-failed",
            },
            call,
        )
        .await
    }

    /// Make `uuid` the default sending alias
    pub async fn set_default_alias(&self, uuid: &str) -> MutationOutcome {
        let kind = MutationKind::SetDefaultAlias {
            uuid: uuid.to_string(),
        };
        let key = QueryKey::new(ops::ALIASES);
        if let Some(book) = self.cache.get_query_data::<AliasBook>(&key) {
            if !book.contains(uuid) {
                let error = Mail3Error::validation(format!("Unknown alias {uuid}"));
                return self.reject(kind, "address.request-failed", error);
            }
        }

        let target = key.clone();
        let new_default = uuid.to_string();
        let patch = CachePatch::new(move |cache: &QueryCache| {
            let Some(previous) = cache
                .get_query_data::<AliasBook>(&target)
                .and_then(|book| book.active_uuid().map(str::to_string))
            else {
                return Revert::noop();
            };
            cache.update_query_data::<AliasBook, _>(&target, |book| book.with_default(&new_default));
            Revert::new(move |cache: &QueryCache| {
                cache.update_query_data::<AliasBook, _>(&target, |book| {
                    if book.active_uuid() == Some(new_default.as_str()) {
                        book.with_default(&previous)
                    } else {
                        book.clone()
                    }
                });
            })
        });
        let call = self.api.set_default_alias(uuid);
        self.run(
            kind,
            Some(patch),
            vec![key],
            Messages {
                ok: None,
                fail: "address.request-failed",
            },
            call,
        )
        .await
    }

    /// Ask the backend to re-scan the chain for names of `kind`, then
    /// reload the alias list.
    ///
    /// A wallet without any such names is not an error; there is nothing
    /// new to reload then.
    pub async fn refresh_aliases(&self, kind: AliasKind) -> MutationOutcome {
        let mutation = MutationKind::RefreshAliases { kind };
        if !kind.is_refreshable() {
            let error = Mail3Error::validation(format!("{kind} aliases cannot be refreshed"));
            return self.reject(mutation, "address.refresh_failed", error);
        }

        let api = &self.api;
        let found = AtomicBool::new(true);
        let call = async {
            match api.refresh_aliases(kind).await {
                Err(e) if e.domain_code() == Some(&ErrorCode::EmptyEnsList) => {
                    debug!("No {} names found for this wallet", kind);
                    found.store(false, Ordering::SeqCst);
                    Ok(())
                }
                other => other,
            }
        };
        let outcome = self
            .run(
                mutation,
                None,
                Vec::new(),
                Messages {
                    ok: None,
                    fail: "address.refresh_failed",
                },
                call,
            )
            .await;

        if outcome.is_committed() && found.load(Ordering::SeqCst) {
            self.cache.invalidate(&QueryKey::new(ops::ALIASES));
            if let Err(e) = load_aliases(&self.cache, &self.api, &self.options, RefetchTrigger::Invalidation).await {
                warn!("Failed to reload aliases after refresh: {}", e);
            }
        }
        outcome
    }

    /// Change nickname and, when `avatar` is given, upload a new avatar.
    ///
    /// Input is validated before anything is sent.
    pub async fn update_profile(&self, nickname: &str, avatar: Option<AvatarUpload>) -> MutationOutcome {
        let kind = MutationKind::UpdateProfile {
            nickname: nickname.to_string(),
        };
        if !is_valid_nickname(nickname) {
            let error = Mail3Error::validation(format!("Invalid nickname: {nickname:?}"));
            return self.reject(kind, "profile.invalid_nickname", error);
        }
        if let Some(upload) = &avatar {
            if upload.bytes.len() > MAX_AVATAR_SIZE {
                let error = Mail3Error::validation(format!(
                    "Avatar is {} bytes, limit is {}",
                    upload.bytes.len(),
                    MAX_AVATAR_SIZE
                ));
                return self.reject(kind, "avatar.too_large", error);
            }
        }

        let key = QueryKey::new(ops::USER_INFO);
        let target = key.clone();
        let new_nickname = nickname.to_string();
        let patch = CachePatch::new(move |cache: &QueryCache| {
            let Some(previous) = cache.get_query_data::<UserInfo>(&target).map(|u| u.nickname.clone()) else {
                return Revert::noop();
            };
            cache.update_query_data::<UserInfo, _>(&target, |user| UserInfo {
                nickname: new_nickname.clone(),
                ..user.clone()
            });
            Revert::new(move |cache: &QueryCache| {
                cache.update_query_data::<UserInfo, _>(&target, |user| {
                    let nickname = if user.nickname == new_nickname {
                        previous
                    } else {
                        user.nickname.clone()
                    };
                    UserInfo {
                        nickname,
                        ..user.clone()
                    }
                });
            })
        });

        let cached_avatar = self.cache.get_query_data::<UserInfo>(&key).map(|u| u.avatar.clone());
        let api = &self.api;
        let call = async move {
            let avatar = match (avatar, cached_avatar) {
                (Some(upload), _) => api.upload_image(&upload.filename, upload.bytes).await?.url,
                (None, Some(current)) => current,
                (None, None) => api.user_info().await?.avatar,
            };
            let update = ProfileUpdate {
                nickname: nickname.to_string(),
                avatar,
            };
            api.update_profile(&update).await
        };

        self.run(
            kind,
            Some(patch),
            vec![key],
            Messages {
                ok: Some("profile.saved"),
                fail: "profile.network_error",
            },
            call,
        )
        .await
    }

    fn confirm(&self, kind: &MutationKind, prompt: ConfirmPrompt) -> bool {
        let confirmed = self.confirmer.confirm(&prompt);
        if !confirmed {
            info!("User cancelled {}", kind);
        }
        confirmed
    }

    /// Outcome for a mutation refused before reaching the backend
    fn reject(&self, kind: MutationKind, key: &str, error: Mail3Error) -> MutationOutcome {
        warn!("Rejected {}: {}", kind, error);
        self.notifier.notify(Notification::warning(key));
        MutationOutcome {
            id: Uuid::new_v4(),
            kind,
            state: MutationState::RolledBack,
            error: Some(error),
        }
    }

    /// Patch that drops `ids` from every cached mailbox page.
    ///
    /// Its revert puts back only those messages, at their old positions.
    fn remove_messages_patch(&self, ids: Vec<String>) -> CachePatch {
        CachePatch::new(move |cache: &QueryCache| {
            let mut removed = Vec::new();
            for key in cache.keys_for_operation(ops::MAILBOX_MESSAGES) {
                let mut taken = Vec::new();
                cache.update_query_data::<Page<MessageSummary>, _>(&key, |page| {
                    taken = page.positions_of(&ids);
                    page.without(&ids)
                });
                if !taken.is_empty() {
                    removed.push((key, taken));
                }
            }
            Revert::new(move |cache: &QueryCache| {
                for (key, taken) in removed {
                    cache.update_query_data::<Page<MessageSummary>, _>(&key, |page| page.with_restored(&taken));
                }
            })
        })
    }

    /// Mailbox whose cached pages list `id`
    fn cached_mailbox_of(&self, id: &str) -> Option<Mailbox> {
        self.cache
            .keys_for_operation(ops::MAILBOX_MESSAGES)
            .into_iter()
            .find_map(|key| {
                let page = self.cache.get_query_data::<Page<MessageSummary>>(&key)?;
                if !page.items.iter().any(|m| m.id == id) {
                    return None;
                }
                Mailbox::from_name(key.params().first()?)
            })
    }

    async fn run<Fut>(
        &self,
        kind: MutationKind,
        patch: Option<CachePatch>,
        invalidate: Vec<QueryKey>,
        messages: Messages,
        call: Fut,
    ) -> MutationOutcome
    where
        Fut: Future<Output = Mail3Result<()>>,
    {
        let id = Uuid::new_v4();
        self.pending.lock().insert(id, kind.clone());

        let guard = self.entity_locks.lock(&kind.entity()).await;
        debug!("Mutation {} started: {}", id, kind);

        let mut deferred = None;
        let mut revert = None;
        if let Some(patch) = patch {
            match self.consistency {
                ConsistencyMode::Optimistic => revert = Some(patch.apply(&self.cache)),
                ConsistencyMode::ConfirmFirst => deferred = Some(patch),
            }
        }

        let (state, error) = match call.await {
            Ok(()) => {
                if let Some(patch) = deferred {
                    patch.apply(&self.cache);
                }
                for key in &invalidate {
                    self.cache.invalidate_prefix(key);
                }
                info!("Mutation {} committed: {}", id, kind);
                if let Some(ok) = messages.ok {
                    self.notifier.notify(Notification::success(ok));
                }
                (MutationState::Committed, None)
            }
            Err(e) => {
                if let Some(revert) = revert {
                    revert.apply(&self.cache);
                }
                warn!("Mutation {} rolled back: {}: {}", id, kind, e);
                self.notifier
                    .notify(Notification::warning(messages.fail).with_detail(e.to_string()));
                (MutationState::RolledBack, Some(e))
            }
        };

        drop(guard);
        self.pending.lock().remove(&id);
        MutationOutcome {
            id,
            kind,
            state,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{AutoConfirm, MockConfirmer, MockNotifier, NotificationLevel};
    use crate::testing::{self, FakeMailApi, RecordingNotifier, WALLET};
    use std::time::Duration;

    const MODES: [ConsistencyMode; 2] = [ConsistencyMode::ConfirmFirst, ConsistencyMode::Optimistic];

    fn mutator(
        api: &Arc<FakeMailApi>,
        cache: &Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
        consistency: ConsistencyMode,
    ) -> Mutator {
        Mutator::new(
            api.clone(),
            cache.clone(),
            notifier,
            Arc::new(AutoConfirm),
            consistency,
            QueryOptions::default(),
        )
    }

    fn inbox_key() -> QueryKey {
        QueryKey::new(ops::MAILBOX_MESSAGES).param("INBOX").param("first")
    }

    fn seeded(api: &FakeMailApi, cache: &QueryCache) {
        api.add_message(Mailbox::Inbox, testing::detail("m1"), "<p>1</p>");
        api.add_message(Mailbox::Inbox, testing::detail("m2"), "<p>2</p>");
        cache.set_query_data(&inbox_key(), api.first_page(Mailbox::Inbox));
    }

    fn cached_ids(cache: &QueryCache) -> Vec<String> {
        cache
            .get_query_data::<Page<MessageSummary>>(&inbox_key())
            .map(|p| p.items.iter().map(|m| m.id.clone()).collect())
            .unwrap_or_default()
    }

    fn seed_aliases(api: &FakeMailApi, cache: &QueryCache) {
        let aliases = vec![
            testing::alias("1", &format!("{WALLET}@mail3.me"), true),
            testing::alias("2", "foo.eth@mail3.me", false),
        ];
        api.set_aliases(aliases.clone());
        cache.set_query_data(&QueryKey::new(ops::ALIASES), AliasBook::from_aliases(aliases));
    }

    fn active_alias(cache: &QueryCache) -> Option<String> {
        cache
            .get_query_data::<AliasBook>(&QueryKey::new(ops::ALIASES))
            .and_then(|b| b.active_uuid().map(str::to_string))
    }

    #[tokio::test]
    async fn test_trash_commits_and_patches_pages() {
        for mode in MODES {
            let api = Arc::new(FakeMailApi::new());
            let cache = Arc::new(QueryCache::new());
            let notifier = Arc::new(RecordingNotifier::new());
            seeded(&api, &cache);

            let outcome = mutator(&api, &cache, notifier.clone(), mode).trash("m1").await;
            assert_eq!(outcome.state, MutationState::Committed);
            assert_eq!(cached_ids(&cache), vec!["m2"]);
            assert_eq!(api.mailbox_ids(Mailbox::Trash), vec!["m1"]);
            assert_eq!(notifier.keys(), vec!["status.trash.ok"]);
            assert!(cache.is_stale(&inbox_key(), &QueryOptions::default()));
        }
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_message_and_notifies() {
        for mode in MODES {
            let api = Arc::new(FakeMailApi::new());
            let cache = Arc::new(QueryCache::new());
            seeded(&api, &cache);
            api.fail("delete_message", 400, Some("USER_NOT_FOUND"));

            let mut notifier = MockNotifier::new();
            notifier
                .expect_notify()
                .withf(|n| n.key == "status.trash.fail" && n.level == NotificationLevel::Warning)
                .times(1)
                .return_const(());

            let outcome = mutator(&api, &cache, Arc::new(notifier), mode).trash("m1").await;
            assert_eq!(outcome.state, MutationState::RolledBack);
            assert_eq!(
                outcome.error.as_ref().and_then(|e| e.domain_code()),
                Some(&ErrorCode::UserNotFound)
            );
            assert_eq!(cached_ids(&cache), vec!["m1", "m2"]);
        }
    }

    #[tokio::test]
    async fn test_failed_default_alias_switch_keeps_previous() {
        for mode in MODES {
            let api = Arc::new(FakeMailApi::new());
            let cache = Arc::new(QueryCache::new());
            let notifier = Arc::new(RecordingNotifier::new());
            seed_aliases(&api, &cache);
            api.fail("set_default_alias", 500, None);

            let before = active_alias(&cache);
            let outcome = mutator(&api, &cache, notifier.clone(), mode).set_default_alias("2").await;
            assert_eq!(outcome.state, MutationState::RolledBack);
            assert_eq!(active_alias(&cache), before);
            assert_eq!(notifier.keys(), vec!["address.request-failed"]);
        }
    }

    #[tokio::test]
    async fn test_default_alias_switch() {
        for mode in MODES {
            let api = Arc::new(FakeMailApi::new());
            let cache = Arc::new(QueryCache::new());
            seed_aliases(&api, &cache);

            let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), mode);
            assert!(m.set_default_alias("2").await.is_committed());
            assert_eq!(active_alias(&cache).as_deref(), Some("2"));

            let unknown = m.set_default_alias("404").await;
            assert!(unknown.error.map(|e| e.is_validation_error()).unwrap_or(false));
            assert_eq!(api.calls("set_default_alias"), 1);
        }
    }

    #[tokio::test]
    async fn test_optimistic_patch_is_visible_while_pending() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        seed_aliases(&api, &cache);
        api.set_delay(Duration::from_millis(30));
        api.fail("set_default_alias", 500, None);

        let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), ConsistencyMode::Optimistic);
        let (outcome, during) = tokio::join!(m.set_default_alias("2"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            (active_alias(&cache), m.pending().len())
        });
        assert_eq!(during, (Some("2".to_string()), 1));
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(active_alias(&cache).as_deref(), Some("1"));
        assert!(m.pending().is_empty());
    }

    #[tokio::test]
    async fn test_same_entity_mutations_are_serialized() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        seed_aliases(&api, &cache);
        api.set_delay(Duration::from_millis(15));

        let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), ConsistencyMode::Optimistic);
        let (a, b) = tokio::join!(m.set_default_alias("2"), m.set_default_alias("1"));
        assert!(a.is_committed() && b.is_committed());
        assert_eq!(api.peak_concurrency(), 1);
        assert_eq!(active_alias(&cache).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_rollback_keeps_other_mutations_on_same_page() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        seeded(&api, &cache);
        api.set_delay(Duration::from_millis(20));
        api.fail("delete_message", 500, None);

        let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), ConsistencyMode::Optimistic);
        let (trashed, deleted) = tokio::join!(m.trash("m1"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            m.batch_delete(&["m2".to_string()]).await
        });

        assert_eq!(trashed.state, MutationState::RolledBack);
        assert!(deleted.unwrap().is_committed());
        assert_eq!(api.mailbox_ids(Mailbox::Inbox), vec!["m1"]);
        assert_eq!(cached_ids(&cache), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_rollback_restores_original_position() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        for id in ["m1", "m2", "m3"] {
            api.add_message(Mailbox::Inbox, testing::detail(id), "");
        }
        cache.set_query_data(&inbox_key(), api.first_page(Mailbox::Inbox));
        api.set_delay(Duration::from_millis(20));
        api.fail("delete_message", 500, None);

        let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), ConsistencyMode::Optimistic);
        let (outcome, during) = tokio::join!(m.trash("m2"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cached_ids(&cache)
        });
        assert_eq!(during, vec!["m1", "m3"]);
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(cached_ids(&cache), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_entity_locks_are_released() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        for i in 0..20 {
            api.add_message(Mailbox::Inbox, testing::detail(&format!("m{i}")), "");
        }
        let m = mutator(&api, &cache, Arc::new(RecordingNotifier::new()), ConsistencyMode::Optimistic);

        for i in 0..20 {
            assert!(m.trash(&format!("m{i}")).await.is_committed());
        }
        assert_eq!(m.entity_locks.len(), 0);
        assert!(m.pending().is_empty());
    }

    #[tokio::test]
    async fn test_declined_confirmation_skips_mutation() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        seeded(&api, &cache);

        let mut confirmer = MockConfirmer::new();
        confirmer
            .expect_confirm()
            .withf(|p| p.title == "confirm.delete.title")
            .times(2)
            .return_const(false);
        let m = Mutator::new(
            api.clone(),
            cache.clone(),
            Arc::new(RecordingNotifier::new()),
            Arc::new(confirmer),
            ConsistencyMode::ConfirmFirst,
            QueryOptions::default(),
        );

        assert!(m.delete_permanently("m1").await.is_none());
        assert!(m.batch_delete(&["m1".to_string()]).await.is_none());
        assert_eq!(api.total_calls(), 0);
        assert_eq!(cached_ids(&cache), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_permanent_and_batch_delete() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        seeded(&api, &cache);
        api.add_message(Mailbox::Drafts, testing::detail("d1"), "");
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        let outcome = m.delete_permanently("m1").await.unwrap();
        assert!(outcome.is_committed());
        assert!(api.mailbox_ids(Mailbox::Trash).is_empty());

        let outcome = m.batch_delete(&["m2".to_string(), "d1".to_string()]).await.unwrap();
        assert!(outcome.is_committed());
        assert!(cached_ids(&cache).is_empty());
        assert!(api.mailbox_ids(Mailbox::Drafts).is_empty());
        assert_eq!(notifier.keys(), vec!["status.delete.ok", "status.batch_delete.ok"]);
        assert!(m.batch_delete(&[]).await.is_none());
    }

    #[tokio::test]
    async fn test_restore_failure() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        api.fail("move_message", 500, None);
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        let outcome = m.restore("m1").await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(notifier.keys(), vec!["restore-failed"]);
    }

    #[tokio::test]
    async fn test_restore_only_from_trash_or_spam() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        api.add_message(Mailbox::Sent, testing::detail("s1"), "");
        api.add_message(Mailbox::Trash, testing::detail("t1"), "");
        let sent = QueryKey::new(ops::MAILBOX_MESSAGES).param("Sent").param("first");
        let trash = QueryKey::new(ops::MAILBOX_MESSAGES).param("Trash").param("first");
        cache.set_query_data(&sent, api.first_page(Mailbox::Sent));
        cache.set_query_data(&trash, api.first_page(Mailbox::Trash));
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        let outcome = m.restore("s1").await;
        assert!(outcome.error.unwrap().is_validation_error());
        assert_eq!(api.calls("move_message"), 0);

        assert!(m.restore("t1").await.is_committed());
        assert_eq!(api.mailbox_ids(Mailbox::Inbox), vec!["t1"]);
        assert!(cache
            .get_query_data::<Page<MessageSummary>>(&trash)
            .unwrap()
            .items
            .is_empty());
        assert_eq!(notifier.keys(), vec!["restore-failed"]);
    }

    #[tokio::test]
    async fn test_validation_never_reaches_backend() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        let outcome = m.update_profile("not valid!", None).await;
        assert!(outcome.error.unwrap().is_validation_error());
        let outcome = m.update_profile("this_name_is_way_too_long", None).await;
        assert_eq!(outcome.state, MutationState::RolledBack);

        let big = AvatarUpload {
            filename: "me.png".to_string(),
            bytes: vec![0; MAX_AVATAR_SIZE + 1],
        };
        let outcome = m.update_profile("neo", Some(big)).await;
        assert_eq!(outcome.state, MutationState::RolledBack);

        let outcome = m.refresh_aliases(AliasKind::Primitive).await;
        assert_eq!(outcome.state, MutationState::RolledBack);

        assert_eq!(api.total_calls(), 0);
        assert_eq!(
            notifier.keys(),
            vec![
                "profile.invalid_nickname",
                "profile.invalid_nickname",
                "avatar.too_large",
                "address.refresh_failed"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_profile_uploads_avatar() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        cache.set_query_data(
            &QueryKey::new(ops::USER_INFO),
            UserInfo {
                nickname: "old".to_string(),
                ..UserInfo::default()
            },
        );
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        let avatar = AvatarUpload {
            filename: "me.png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let outcome = m.update_profile("neo_2022", Some(avatar)).await;
        assert!(outcome.is_committed());
        assert_eq!(api.user().nickname, "neo_2022");
        assert_eq!(api.user().avatar, "https://cdn.mail3.me/me.png");
        let cached = cache.get_query_data::<UserInfo>(&QueryKey::new(ops::USER_INFO)).unwrap();
        assert_eq!(cached.nickname, "neo_2022");
        assert_eq!(notifier.keys(), vec!["profile.saved"]);
    }

    #[tokio::test]
    async fn test_update_profile_network_error() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        api.fail("update_profile", 502, None);
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::Optimistic);

        let outcome = m.update_profile("neo", None).await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(api.calls("user_info"), 1);
        assert_eq!(notifier.keys(), vec!["profile.network_error"]);
    }

    #[tokio::test]
    async fn test_refresh_swallows_empty_ens_list() {
        let api = Arc::new(FakeMailApi::new());
        let cache = Arc::new(QueryCache::new());
        let notifier = Arc::new(RecordingNotifier::new());
        seed_aliases(&api, &cache);
        api.fail("refresh_aliases", 400, Some("EMPTY_ENS_LIST"));
        let m = mutator(&api, &cache, notifier.clone(), ConsistencyMode::ConfirmFirst);

        // no names found: nothing to report, nothing to reload
        let outcome = m.refresh_aliases(AliasKind::EnsLike).await;
        assert!(outcome.is_committed());
        assert_eq!(api.calls("aliases"), 0);
        assert!(notifier.keys().is_empty());

        api.fail("refresh_aliases", 500, None);
        let outcome = m.refresh_aliases(AliasKind::BitLike).await;
        assert_eq!(outcome.state, MutationState::RolledBack);
        assert_eq!(api.calls("aliases"), 0);
        assert_eq!(notifier.keys(), vec!["address.refresh_failed"]);

        api.recover("refresh_aliases");
        assert!(m.refresh_aliases(AliasKind::BitLike).await.is_committed());
        assert_eq!(api.calls("aliases"), 1);
    }

    #[test]
    fn test_nickname_rule() {
        assert!(is_valid_nickname("neo_2022"));
        assert!(is_valid_nickname("a"));
        assert!(!is_valid_nickname(""));
        assert!(!is_valid_nickname("with space"));
        assert!(!is_valid_nickname("abcdefghijklmnopq"));
    }
}
