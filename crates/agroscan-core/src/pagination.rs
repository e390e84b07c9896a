//! Cursor pagination for list screens.
//!
//! `CursorPager` accumulates pages from a `PageSource`. Cursors are opaque
//! and forwarded verbatim. At most one fetch runs at a time: calls made
//! while one is in flight return `Ok(false)` without touching the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::ChatSummary;

/// One page as returned by a source
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    /// Total number of items the server reports, across all pages
    pub total: u64,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<Self::Item>, ApiError>;
}

#[derive(Debug)]
struct PagerState<T> {
    items: Vec<T>,
    has_more: bool,
    next_cursor: Option<String>,
    total: u64,
}

impl<T> Default for PagerState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_cursor: None,
            total: 0,
        }
    }
}

/// Clears the in-flight flag when a fetch ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CursorPager<S: PageSource> {
    source: S,
    page_size: u32,
    state: Mutex<PagerState<S::Item>>,
    loading: AtomicBool,
}

impl<S: PageSource> CursorPager<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            state: Mutex::new(PagerState::default()),
            loading: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, PagerState<S::Item>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn has_more(&self) -> bool {
        self.state().has_more
    }

    pub fn next_cursor(&self) -> Option<String> {
        self.state().next_cursor.clone()
    }

    pub fn total(&self) -> u64 {
        self.state().total
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    /// Load the first page, replacing whatever was accumulated.
    ///
    /// If the server returns no items but reports a non-zero total, the
    /// first page is requested once more with the page size enlarged to
    /// that total.
    pub async fn refresh(&self) -> Result<bool, ApiError> {
        let Some(_in_flight) = InFlight::acquire(&self.loading) else {
            debug!("Refresh ignored, fetch already in flight");
            return Ok(false);
        };

        let mut page = self.source.fetch_page(None, self.page_size).await?;
        if page.items.is_empty() && page.total > 0 {
            let limit = u32::try_from(page.total).unwrap_or(u32::MAX);
            debug!(total = page.total, limit, "Empty first page, refetching with full limit");
            page = self.source.fetch_page(None, limit).await?;
        }

        let mut state = self.state();
        *state = PagerState::default();
        Self::apply(&mut state, page);
        Ok(true)
    }

    /// Fetch the next page and append it.
    ///
    /// No-op returning `Ok(false)` when there is nothing more to load or a
    /// fetch is already running.
    pub async fn load_more(&self) -> Result<bool, ApiError> {
        let Some(_in_flight) = InFlight::acquire(&self.loading) else {
            debug!("Load more ignored, fetch already in flight");
            return Ok(false);
        };

        // Cursor is read under the flag
        let cursor = {
            let state = self.state();
            match (state.has_more, state.next_cursor.clone()) {
                (true, Some(cursor)) => cursor,
                _ => return Ok(false),
            }
        };

        let page = self
            .source
            .fetch_page(Some(&cursor), self.page_size)
            .await?;
        let mut state = self.state();
        Self::apply(&mut state, page);
        Ok(true)
    }

    fn apply(state: &mut PagerState<S::Item>, page: Page<S::Item>) {
        let has_more = page.has_more && page.next_cursor.is_some();
        if page.has_more && !has_more {
            warn!("Page reports more results without a cursor, treating as last page");
        }
        debug!(items = page.items.len(), has_more, "Page received");

        state.items.extend(page.items);
        state.has_more = has_more;
        state.next_cursor = if has_more { page.next_cursor } else { None };
        state.total = page.total;
    }
}

impl<S> CursorPager<S>
where
    S: PageSource,
    S::Item: Clone,
{
    /// Snapshot of the accumulated items, in arrival order
    pub fn items(&self) -> Vec<S::Item> {
        self.state().items.clone()
    }
}

/// Chat history for one user, fetched through the API client
pub struct ChatHistorySource {
    client: ApiClient,
    uid: String,
}

impl ChatHistorySource {
    pub fn new(client: ApiClient, uid: &str) -> Self {
        Self {
            client,
            uid: uid.to_string(),
        }
    }
}

#[async_trait]
impl PageSource for ChatHistorySource {
    type Item = ChatSummary;

    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<Page<ChatSummary>, ApiError> {
        let page = self.client.fetch_chats(&self.uid, limit, cursor).await?;
        Ok(page.into())
    }
}

pub type ChatHistory = CursorPager<ChatHistorySource>;

impl ChatHistory {
    pub fn for_user(client: ApiClient, uid: &str, page_size: u32) -> Self {
        CursorPager::new(ChatHistorySource::new(client, uid), page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Serves queued pages and records every request
    #[derive(Default)]
    struct ScriptedSource {
        pages: Mutex<VecDeque<Page<u32>>>,
        calls: Mutex<Vec<(Option<String>, u32)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Page<u32>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(Option<String>, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Item = u32;

        async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<Page<u32>, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((cursor.map(String::from), limit));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let page = self.pages.lock().unwrap().pop_front();
            page.ok_or_else(|| ApiError::Status {
                status: 500,
                message: Some("no more scripted pages".to_string()),
                body: String::new(),
            })
        }
    }

    fn page(items: Vec<u32>, cursor: Option<&str>, total: u64) -> Page<u32> {
        Page {
            items,
            has_more: cursor.is_some(),
            next_cursor: cursor.map(String::from),
            total,
        }
    }

    #[tokio::test]
    async fn test_load_more_appends_in_order() {
        let pager = CursorPager::new(
            ScriptedSource::new(vec![
                page(vec![1, 2], Some("c2"), 5),
                page(vec![3, 4], Some("c4"), 5),
                page(vec![5], None, 5),
            ]),
            2,
        );

        assert!(pager.refresh().await.unwrap());
        assert_eq!(pager.items(), vec![1, 2]);

        assert!(pager.load_more().await.unwrap());
        assert_eq!(pager.items(), vec![1, 2, 3, 4]);
        assert!(pager.load_more().await.unwrap());
        assert_eq!(pager.items(), vec![1, 2, 3, 4, 5]);
        assert!(!pager.has_more());

        // Exhausted: no further calls
        assert!(!pager.load_more().await.unwrap());
        assert_eq!(
            pager.source.calls(),
            vec![
                (None, 2),
                (Some("c2".to_string()), 2),
                (Some("c4".to_string()), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_more_before_refresh_is_noop() {
        let pager = CursorPager::new(ScriptedSource::new(vec![]), 10);
        assert!(!pager.load_more().await.unwrap());
        assert!(pager.source.calls().is_empty());
        assert!(pager.is_empty());
    }

    #[tokio::test]
    async fn test_empty_first_page_refetches_once_with_total() {
        let pager = CursorPager::new(
            ScriptedSource::new(vec![
                page(vec![], None, 7),
                page(vec![1, 2, 3, 4, 5, 6, 7], None, 7),
            ]),
            10,
        );
        pager.refresh().await.unwrap();
        assert_eq!(pager.source.calls(), vec![(None, 10), (None, 7)]);
        assert_eq!(pager.len(), 7);
    }

    #[tokio::test]
    async fn test_empty_refetch_is_not_repeated() {
        let pager = CursorPager::new(
            ScriptedSource::new(vec![page(vec![], None, 3), page(vec![], None, 3)]),
            10,
        );
        pager.refresh().await.unwrap();
        assert_eq!(pager.source.calls().len(), 2);
        assert!(pager.is_empty());
        assert_eq!(pager.total(), 3);
    }

    #[tokio::test]
    async fn test_has_more_without_cursor_is_last_page() {
        let mut first = page(vec![1], None, 2);
        first.has_more = true;
        let pager = CursorPager::new(ScriptedSource::new(vec![first]), 1);
        pager.refresh().await.unwrap();
        assert!(!pager.has_more());
        assert!(!pager.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn test_error_leaves_collection_unchanged() {
        let pager = CursorPager::new(ScriptedSource::new(vec![page(vec![1], Some("c1"), 2)]), 1);
        pager.refresh().await.unwrap();

        let err = pager.load_more().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(pager.items(), vec![1]);
        assert_eq!(pager.next_cursor().as_deref(), Some("c1"));
        assert!(!pager.is_loading());
    }

    #[tokio::test]
    async fn test_load_more_during_refresh_keeps_new_cursor() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some(gate.clone()),
            ..ScriptedSource::new(vec![
                page(vec![1], Some("old"), 4),
                page(vec![10], Some("new"), 4),
                page(vec![11], None, 4),
            ])
        };
        let pager = CursorPager::new(source, 1);

        gate.notify_one();
        pager.refresh().await.unwrap();

        // The second refresh is parked on the gate while load_more runs
        let (refreshed, loaded) = tokio::join!(pager.refresh(), async {
            let loaded = pager.load_more().await;
            gate.notify_one();
            loaded
        });
        assert!(refreshed.unwrap());
        assert!(!loaded.unwrap());
        assert_eq!(pager.items(), vec![10]);

        gate.notify_one();
        assert!(pager.load_more().await.unwrap());
        assert_eq!(pager.items(), vec![10, 11]);
        assert_eq!(
            pager.source.calls(),
            vec![
                (None, 1),
                (None, 1),
                (Some("new".to_string()), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_reentrant_load_more_is_ignored() {
        let gate = Arc::new(Notify::new());
        let source = ScriptedSource {
            gate: Some(gate.clone()),
            ..ScriptedSource::new(vec![page(vec![1], Some("c1"), 3), page(vec![2], Some("c2"), 3)])
        };
        let pager = CursorPager::new(source, 1);

        gate.notify_one();
        pager.refresh().await.unwrap();

        let (first, second) = tokio::join!(pager.load_more(), async {
            // First call is parked on the gate, so this one must bail out
            let second = pager.load_more().await;
            gate.notify_one();
            second
        });

        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(pager.items(), vec![1, 2]);
        assert_eq!(pager.source.calls().len(), 2);
    }
}
