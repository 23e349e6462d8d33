//! Query cache and fetchers
//!
//! A process-wide [`QueryCache`] holds every server read keyed by
//! [`QueryKey`]. Fetchers go through [`QueryCache::fetch_query`], which
//! decides per [`RefetchTrigger`] whether the backend is hit at all and
//! folds concurrent duplicate requests into one.

mod cache;
mod detail;
mod key;
mod paginated;

pub use cache::{CacheStats, QueryCache};
pub use detail::DetailFetcher;
pub use key::{ops, QueryKey};
pub use paginated::{PageFetcher, PaginatedList};

pub(crate) use detail::load_preview;

use std::sync::Arc;
use std::time::Duration;

use crate::alias::AliasBook;
use crate::api::MailApi;
use crate::config::QueryConfig;
use crate::error::Mail3Result;
use crate::types::UserInfo;

/// Lifecycle of a cached query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Never fetched
    #[default]
    Idle,
    /// A fetch is in flight
    Loading,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed; earlier data, if any, is kept
    Error,
}

/// What caused a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefetchTrigger {
    /// A view mounted
    Mount,
    /// The window regained focus
    WindowFocus,
    /// The network came back
    Reconnect,
    /// The key was invalidated by a mutation
    Invalidation,
    /// The user asked for fresh data
    Manual,
}

/// Per-query fetch policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long data counts as fresh
    pub stale_time: Duration,
    /// How long an entry nobody observes stays cached
    pub cache_time: Duration,
    /// Refetch stale data when a view mounts
    pub refetch_on_mount: bool,
    /// Refetch when the window regains focus
    pub refetch_on_window_focus: bool,
    /// Refetch when the network comes back
    pub refetch_on_reconnect: bool,
    /// Extra attempts after a failed fetch
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl QueryOptions {
    /// Options from configuration; focus and reconnect refetches stay off
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            stale_time: config.stale_time(),
            cache_time: config.cache_time(),
            refetch_on_mount: config.refetch_on_mount,
            refetch_on_window_focus: false,
            refetch_on_reconnect: false,
            retry: config.retry,
        }
    }

    /// Whether `trigger` may hit the backend when data is already cached
    pub fn refetches_on(&self, trigger: RefetchTrigger) -> bool {
        match trigger {
            RefetchTrigger::Mount => self.refetch_on_mount,
            RefetchTrigger::WindowFocus => self.refetch_on_window_focus,
            RefetchTrigger::Reconnect => self.refetch_on_reconnect,
            RefetchTrigger::Invalidation | RefetchTrigger::Manual => true,
        }
    }
}

/// Alias book of the account, through the cache
pub async fn load_aliases(
    cache: &QueryCache,
    api: &Arc<dyn MailApi>,
    options: &QueryOptions,
    trigger: RefetchTrigger,
) -> Mail3Result<Arc<AliasBook>> {
    let key = QueryKey::new(ops::ALIASES);
    cache
        .fetch_query(&key, options, trigger, || async {
            let list = api.aliases().await?;
            Ok(AliasBook::from_aliases(list.aliases))
        })
        .await
}

/// Account settings, through the cache
pub async fn load_user_info(
    cache: &QueryCache,
    api: &Arc<dyn MailApi>,
    options: &QueryOptions,
    trigger: RefetchTrigger,
) -> Mail3Result<Arc<UserInfo>> {
    let key = QueryKey::new(ops::USER_INFO);
    cache
        .fetch_query(&key, options, trigger, || api.user_info())
        .await
}
