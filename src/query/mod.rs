//! Resource Query Controller
//!
//! [`ResourceQuery`] turns list-screen input (search text, page, page size,
//! sort) into cache keys and exposes the page currently held for them.
//! Search text goes through a [`Debouncer`] before it becomes part of the
//! key, so typing does not issue one request per keystroke.

pub mod debounce;

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::cache::{CacheKey, EntryStatus, RequestCache, SortDirection, SortSpec};
use crate::client::{ListQuery, Page, ResourceApi};
use crate::error::{ApiError, ValidationError};
use crate::resource::ResourceDescriptor;

pub use debounce::{DEFAULT_DEBOUNCE, Debouncer};

/// Search input as typed versus as used for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub raw_input: String,
    pub committed_filter: String,
}

/// Load status of the current key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing has been requested for the current key yet
    Idle,
    Loading,
    Ready,
    Failed,
}

/// What a list screen renders
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView<T> {
    pub status: QueryStatus,
    /// Current page; during a refetch this is the previous result
    pub page: Option<Page<T>>,
    pub error: Option<ApiError>,
    pub stale: bool,
}

impl<T> QueryView<T> {
    fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            page: None,
            error: None,
            stale: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }
}

/// Query controller for one resource kind, decoding items as `T`.
pub struct ResourceQuery<T> {
    descriptor: ResourceDescriptor,
    api: Arc<dyn ResourceApi>,
    cache: RequestCache,
    raw_input: String,
    params: Arc<watch::Sender<ListQuery>>,
    filter_commits: Arc<AtomicUsize>,
    debouncer: Debouncer,
    _item: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> ResourceQuery<T> {
    pub fn new(descriptor: ResourceDescriptor, api: Arc<dyn ResourceApi>, cache: RequestCache) -> Self {
        cache.set_stale_time(descriptor.type_name(), descriptor.stale_time);
        let (params, _) = watch::channel(ListQuery::default());

        Self {
            descriptor,
            api,
            cache,
            raw_input: String::new(),
            params: Arc::new(params),
            filter_commits: Arc::new(AtomicUsize::new(0)),
            debouncer: Debouncer::default(),
            _item: PhantomData,
        }
    }

    /// Use `delay` instead of the default debounce interval
    pub fn with_debounce(mut self, delay: Duration) -> Self {
        self.debouncer = Debouncer::new(delay);
        self
    }

    /// Start from `size` items per page
    pub fn with_page_size(self, size: usize) -> Result<Self, ValidationError> {
        self.set_page_size(size)?;
        Ok(self)
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Committed query parameters
    pub fn params(&self) -> ListQuery {
        self.params.borrow().clone()
    }

    pub fn filter_state(&self) -> FilterState {
        FilterState {
            raw_input: self.raw_input.clone(),
            committed_filter: self.params.borrow().filter.clone(),
        }
    }

    /// Number of times a debounced or flushed filter actually changed the query
    pub fn filter_commits(&self) -> usize {
        self.filter_commits.load(Ordering::SeqCst)
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Record a keystroke. The text is committed once input pauses for the
    /// debounce interval, and a committed change starts the read for the new
    /// key; [`fetch`](Self::fetch) and [`view`](Self::view) then see it
    /// loading or ready.
    ///
    /// Outside a tokio runtime there is no timer to wait on: the text is
    /// committed at once and no read is started.
    pub fn set_raw_filter(&mut self, text: impl Into<String>) {
        self.raw_input = text.into();

        let params = Arc::clone(&self.params);
        let commits = Arc::clone(&self.filter_commits);
        let api = Arc::clone(&self.api);
        let cache = self.cache.clone();
        let descriptor = self.descriptor.clone();
        let text = self.raw_input.clone();
        self.debouncer.schedule(move || {
            if !commit_filter(&params, text) {
                return;
            }
            commits.fetch_add(1, Ordering::SeqCst);

            let Ok(runtime) = Handle::try_current() else {
                return;
            };
            let query = params.borrow().clone();
            runtime.spawn(async move {
                let key = query.cache_key(descriptor.type_name());
                let _ = cache.read(&key, list_fetcher(api, descriptor, query)).await;
            });
        });
    }

    /// Commit the raw input now, cancelling any pending timer.
    ///
    /// Unlike a debounced commit this starts no read, so the caller can
    /// adjust page, size or sort first and then [`fetch`](Self::fetch).
    pub fn flush_filter(&mut self) {
        self.debouncer.cancel();
        if commit_filter(&self.params, self.raw_input.clone()) {
            self.filter_commits.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn set_page(&self, page: usize) {
        self.params.send_if_modified(|q| {
            let changed = q.page != page;
            q.page = page;
            changed
        });
    }

    /// Change the page size; jumps back to the first page.
    pub fn set_page_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::field("size", "must be at least 1"));
        }

        self.params.send_if_modified(|q| {
            if q.size == size {
                return false;
            }
            q.size = size;
            q.page = 0;
            true
        });
        Ok(())
    }

    /// Sort by `field`. The page is kept unless the resource opts into
    /// resetting it.
    pub fn set_sort(&self, field: impl Into<String>, direction: SortDirection) {
        let sort = Some(SortSpec::new(field, direction));
        self.replace_sort(sort);
    }

    /// Back to server-default ordering
    pub fn clear_sort(&self) {
        self.replace_sort(None);
    }

    fn replace_sort(&self, sort: Option<SortSpec>) {
        let reset_page = self.descriptor.reset_page_on_sort;
        self.params.send_if_modified(|q| {
            if q.sort == sort {
                return false;
            }
            q.sort = sort;
            if reset_page {
                q.page = 0;
            }
            true
        });
    }

    /// Channel that yields the committed parameters whenever they change
    pub fn subscribe(&self) -> watch::Receiver<ListQuery> {
        self.params.subscribe()
    }

    /// Cache key of the committed parameters
    pub fn key(&self) -> CacheKey {
        self.params.borrow().cache_key(self.descriptor.type_name())
    }

    /// Read the current key through the cache.
    ///
    /// If the parameters change while waiting, the response still fills
    /// its own entry but the returned view is that of the new key.
    pub async fn fetch(&self) -> QueryView<T> {
        let query = self.params();
        let key = query.cache_key(self.descriptor.type_name());
        let _ = self.cache.read(&key, self.fetcher(query)).await;
        self.view()
    }

    /// Force a new request for the current key
    pub async fn refetch(&self) -> QueryView<T> {
        let query = self.params();
        let key = query.cache_key(self.descriptor.type_name());
        let _ = self.cache.refetch(&key, self.fetcher(query)).await;
        self.view()
    }

    /// View of the current key derived from the cache; never fetches
    pub fn view(&self) -> QueryView<T> {
        let Some(snapshot) = self.cache.peek(&self.key()) else {
            return QueryView::idle();
        };

        let mut status = match snapshot.status {
            EntryStatus::Pending => QueryStatus::Loading,
            EntryStatus::Ready => QueryStatus::Ready,
            EntryStatus::Failed => QueryStatus::Failed,
        };
        let mut error = snapshot.error;

        let page = match snapshot.data {
            Some(data) => match serde_json::from_value::<Page<Value>>(data).and_then(Page::decode) {
                Ok(page) => Some(page),
                Err(e) => {
                    status = QueryStatus::Failed;
                    error = Some(ApiError::InvalidResponse(format!(
                        "Failed to decode {} page: {}",
                        self.descriptor.type_name(),
                        e
                    )));
                    None
                }
            },
            None => None,
        };

        QueryView {
            status,
            page,
            error,
            stale: snapshot.stale,
        }
    }

    fn fetcher(&self, query: ListQuery) -> impl FnOnce() -> BoxFuture<'static, Result<Value, ApiError>> {
        list_fetcher(Arc::clone(&self.api), self.descriptor.clone(), query)
    }
}

/// Fetcher for one collection read, as the cache stores it
fn list_fetcher(
    api: Arc<dyn ResourceApi>,
    descriptor: ResourceDescriptor,
    query: ListQuery,
) -> impl FnOnce() -> BoxFuture<'static, Result<Value, ApiError>> {
    move || {
        async move {
            let page = api.list(&descriptor, &query).await?;
            serde_json::to_value(page).map_err(|e| ApiError::InvalidResponse(e.to_string()))
        }
        .boxed()
    }
}

/// Apply a committed filter. A changed filter resets the page to 0.
fn commit_filter(params: &watch::Sender<ListQuery>, filter: String) -> bool {
    params.send_if_modified(|q| {
        if q.filter == filter {
            return false;
        }
        debug!("Committing search filter {:?}", filter);
        q.filter = filter;
        q.page = 0;
        true
    })
}
