//! Cursor-paginated lists

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use super::{QueryCache, QueryKey, QueryOptions, RefetchTrigger};
use crate::error::Mail3Result;
use crate::types::{Cursor, Identified, Page};

/// Cursor parameter of the first page
const FIRST_PAGE: &str = "first";

/// Produces one page given the cursor of the previous page
pub type PageFetcher<T> = Arc<dyn Fn(Option<Cursor>) -> BoxFuture<'static, Mail3Result<Page<T>>> + Send + Sync>;

#[derive(Debug, Default)]
struct ListState {
    /// Keys of the pages loaded so far, in order
    page_keys: Vec<QueryKey>,
    /// Cursor for the next request
    next: Option<Cursor>,
    /// An empty cursor came back
    finished: bool,
    /// Ids filtered out of `items`
    hidden: HashSet<String>,
}

/// A lazily extended list backed by cached pages.
///
/// Each page lives in the [`QueryCache`] under the base key plus its
/// cursor, so two lists over the same data share pages and concurrent
/// requests for one page are folded by the cache. Loaded pages are
/// observed, so they outlive the cache time until the list is reset or
/// dropped.
pub struct PaginatedList<T> {
    cache: Arc<QueryCache>,
    base_key: QueryKey,
    options: QueryOptions,
    fetcher: PageFetcher<T>,
    state: Mutex<ListState>,
}

impl<T> PaginatedList<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// Create an empty list; nothing is fetched until [`fetch_next_page`](Self::fetch_next_page)
    pub fn new(cache: Arc<QueryCache>, base_key: QueryKey, options: QueryOptions, fetcher: PageFetcher<T>) -> Self {
        Self {
            cache,
            base_key,
            options,
            fetcher,
            state: Mutex::new(ListState::default()),
        }
    }

    /// Base key the pages are stored under
    pub fn base_key(&self) -> &QueryKey {
        &self.base_key
    }

    /// Load the next page.
    ///
    /// Returns `Ok(false)` without touching the backend once the last
    /// page has been seen.
    pub async fn fetch_next_page(&self, trigger: RefetchTrigger) -> Mail3Result<bool> {
        let cursor = {
            let state = self.state.lock();
            if state.finished {
                debug!("{} has no more pages", self.base_key);
                return Ok(false);
            }
            state.next.clone()
        };

        let key = self
            .base_key
            .param(cursor.as_ref().map(Cursor::as_str).unwrap_or(FIRST_PAGE));
        let page: Arc<Page<T>> = self
            .cache
            .fetch_query(&key, &self.options, trigger, || (self.fetcher)(cursor.clone()))
            .await?;

        let mut state = self.state.lock();
        if state.page_keys.contains(&key) {
            // a concurrent call already appended this page
            return Ok(!state.finished);
        }
        self.cache.observe(&key);
        state.page_keys.push(key);
        if page.is_last() {
            state.finished = true;
            state.next = None;
        } else {
            state.next = Some(page.next_cursor.clone());
        }
        Ok(true)
    }

    /// Items of all loaded pages, minus hidden ids.
    ///
    /// Pages are read back from the cache so patches made there show up.
    pub fn items(&self) -> Vec<T> {
        let state = self.state.lock();
        state
            .page_keys
            .iter()
            .filter_map(|key| self.cache.get_query_data::<Page<T>>(key))
            .flat_map(|page| page.items.clone())
            .filter(|item| !state.hidden.contains(item.id()))
            .collect()
    }

    /// Number of loaded pages
    pub fn page_count(&self) -> usize {
        self.state.lock().page_keys.len()
    }

    /// Whether the last page has been loaded
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Filter `ids` out of [`items`](Self::items)
    pub fn hide(&self, ids: &[String]) {
        self.state.lock().hidden.extend(ids.iter().cloned());
    }

    /// Forget loaded pages; the next fetch starts from the first page
    pub fn reset(&self) {
        let old = std::mem::take(&mut *self.state.lock());
        for key in &old.page_keys {
            self.cache.release(key);
        }
    }

    /// Invalidate every page and reload the first one
    pub async fn refresh(&self) -> Mail3Result<bool> {
        self.cache.invalidate_prefix(&self.base_key);
        self.reset();
        self.fetch_next_page(RefetchTrigger::Manual).await
    }
}

impl<T> Drop for PaginatedList<T> {
    fn drop(&mut self) {
        for key in &self.state.get_mut().page_keys {
            self.cache.release(key);
        }
    }
}
