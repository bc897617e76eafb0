//! Key-addressed store of asynchronous read results
//!
//! [`RequestCache`] memoizes backend reads by [`CacheKey`]. A fresh Ready
//! entry is served without touching the backend, concurrent reads of a
//! pending key share one request, and invalidation only marks entries stale
//! so the refetch happens on the next read.
//!
//! Every state transition happens under a short synchronous lock that is
//! never held across an await. Fetches run as spawned tasks, so a request
//! whose reader went away still settles its own entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use serde_json::Value;

use super::StaleTime;
use super::entry::{CacheEntry, EntrySnapshot, EntryStatus};
use super::key::CacheKey;
use super::storage::CacheStorage;
use crate::error::ApiError;

/// Opaque result stored per key
pub type Payload = Value;

type FetchResult = Result<Payload, ApiError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    stale_times: HashMap<String, Duration>,
    next_generation: u64,
}

impl CacheState {
    fn stale_time_for(&self, resource: &str, default: Duration) -> Duration {
        self.stale_times.get(resource).copied().unwrap_or(default)
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

enum Lookup {
    Hit(Payload),
    Failed(ApiError),
    Attach(SharedFetch),
    Start,
}

/// Process-scoped request cache.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct RequestCache {
    state: Arc<Mutex<CacheState>>,
    storage: Option<Arc<Mutex<CacheStorage>>>,
    default_stale_time: Duration,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCache {
    /// In-memory cache with the default staleness window
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            storage: None,
            default_stale_time: StaleTime::DEFAULT,
        }
    }

    /// Write Ready results through to `storage` and consult it on misses
    pub fn with_storage(mut self, storage: CacheStorage) -> Self {
        self.storage = Some(Arc::new(Mutex::new(storage)));
        self
    }

    pub fn with_default_stale_time(mut self, stale_time: Duration) -> Self {
        self.default_stale_time = stale_time;
        self
    }

    /// Override the staleness window for every key of `resource`
    pub fn set_stale_time(&self, resource: &str, stale_time: Duration) {
        self.lock()
            .stale_times
            .insert(resource.to_string(), stale_time);
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read `key`, calling `fetcher` only when nothing usable is cached.
    ///
    /// A fresh Ready entry is returned as-is. A pending entry is joined
    /// rather than fetched twice. A Failed entry keeps returning its error
    /// until it is invalidated or refetched. Anything else starts a new
    /// request.
    ///
    /// `fetcher` is invoked while the cache lock is held and must only build
    /// the future; the future itself runs on a spawned task.
    pub async fn read<F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<Payload, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let fetch = {
            let mut state = self.lock();
            self.hydrate(&mut state, key);

            match self.lookup(&state, key) {
                Lookup::Hit(data) => {
                    debug!("Cache hit: {}", key);
                    return Ok(data);
                }
                Lookup::Failed(err) => {
                    debug!("Cache holds failure for {}", key);
                    return Err(err);
                }
                Lookup::Attach(fetch) => {
                    debug!("Joining in-flight request for {}", key);
                    fetch
                }
                Lookup::Start => {
                    debug!("Cache miss: {}", key);
                    self.start(&mut state, key, fetcher)
                }
            }
        };

        fetch.await
    }

    /// Start a new request for `key` regardless of what is cached.
    ///
    /// Any request already in flight for the key is superseded: its
    /// response is discarded when it arrives.
    pub async fn refetch<F, Fut>(&self, key: &CacheKey, fetcher: F) -> Result<Payload, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let fetch = {
            let mut state = self.lock();
            debug!("Forced refetch: {}", key);
            self.start(&mut state, key, fetcher)
        };

        fetch.await
    }

    /// Mark every entry whose key matches `predicate` stale.
    ///
    /// Nothing is refetched here; the next read of each key does that.
    /// Returns the number of in-memory entries marked.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let marked = {
            let mut state = self.lock();
            let mut marked = 0;
            for (key, entry) in state.entries.iter_mut() {
                if predicate(key) {
                    entry.stale = true;
                    marked += 1;
                }
            }
            marked
        };

        if let Some(storage) = &self.storage {
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = storage.invalidate(&predicate) {
                warn!("Failed to invalidate persisted cache entries: {}", e);
            }
        }

        debug!("Invalidated {} cache entries", marked);
        marked
    }

    /// Snapshot of `key` without fetching anything
    pub fn peek(&self, key: &CacheKey) -> Option<EntrySnapshot> {
        let mut state = self.lock();
        self.hydrate(&mut state, key);
        let stale_time = state.stale_time_for(key.resource(), self.default_stale_time);
        state
            .entries
            .get(key)
            .map(|entry| entry.snapshot(stale_time, Utc::now()))
    }

    /// Drop every entry, in memory and persisted.
    ///
    /// Requests still in flight settle into nothing.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.entries.clear();
            state.in_flight.clear();
        }

        if let Some(storage) = &self.storage {
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            match storage.clear_all() {
                Ok(stats) => debug!("Cleared {} persisted cache entries", stats.entries_removed),
                Err(e) => warn!("Failed to clear persisted cache: {}", e),
            }
        }
    }

    /// Number of keys currently held in memory
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests still awaiting a response
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn lookup(&self, state: &CacheState, key: &CacheKey) -> Lookup {
        let stale_time = state.stale_time_for(key.resource(), self.default_stale_time);

        let Some(entry) = state.entries.get(key) else {
            return Lookup::Start;
        };

        match entry.status {
            EntryStatus::Ready if entry.is_fresh(stale_time, Utc::now()) => {
                Lookup::Hit(entry.data.clone().unwrap_or(Value::Null))
            }
            EntryStatus::Pending if !entry.stale => match state.in_flight.get(key) {
                Some(in_flight) => Lookup::Attach(in_flight.fetch.clone()),
                None => Lookup::Start,
            },
            EntryStatus::Failed if !entry.stale => match &entry.error {
                Some(err) => Lookup::Failed(err.clone()),
                None => Lookup::Start,
            },
            _ => Lookup::Start,
        }
    }

    /// Load a persisted entry into memory when the key is not held yet
    fn hydrate(&self, state: &mut CacheState, key: &CacheKey) {
        if state.entries.contains_key(key) {
            return;
        }
        let Some(storage) = &self.storage else {
            return;
        };

        let stored = {
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            storage.get(key)
        };

        match stored {
            Ok(Some(stored)) => {
                let generation = state.next_generation();
                let mut entry = CacheEntry::ready(key.clone(), stored.data, stored.fetched_at, generation);
                entry.stale = stored.stale;
                debug!("Loaded {} from persistent cache (stale={})", key, entry.stale);
                state.entries.insert(key.clone(), entry);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read persisted cache entry for {}: {}", key, e),
        }
    }

    fn start<F, Fut>(&self, state: &mut CacheState, key: &CacheKey, fetcher: F) -> SharedFetch
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let generation = state.next_generation();
        let previous = state.entries.remove(key);
        state.entries.insert(
            key.clone(),
            CacheEntry::pending(key.clone(), generation, previous),
        );

        let request = fetcher();
        let settle_state = Arc::clone(&self.state);
        let storage = self.storage.clone();
        let settle_key = key.clone();

        let task = tokio::spawn(async move {
            let result = request.await;
            settle(&settle_state, storage.as_deref(), &settle_key, generation, &result);
            result
        });

        let fetch = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ApiError::Network(format!("request task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                fetch: fetch.clone(),
            },
        );

        fetch
    }
}

/// Record a response, unless a newer request for the same key has started.
fn settle(
    state: &Mutex<CacheState>,
    storage: Option<&Mutex<CacheStorage>>,
    key: &CacheKey,
    generation: u64,
    result: &FetchResult,
) {
    let persist = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);

        if state
            .in_flight
            .get(key)
            .is_some_and(|f| f.generation == generation)
        {
            state.in_flight.remove(key);
        }

        let Some(entry) = state
            .entries
            .get_mut(key)
            .filter(|entry| entry.generation == generation)
        else {
            debug!("Discarding superseded response for {}", key);
            return;
        };

        match result {
            Ok(data) => {
                let fetched_at = Utc::now();
                entry.status = EntryStatus::Ready;
                entry.data = Some(data.clone());
                entry.error = None;
                entry.last_fetched_at = Some(fetched_at);
                // An invalidation that raced this request keeps the entry stale
                (!entry.stale).then(|| (data.clone(), fetched_at))
            }
            Err(err) => {
                debug!("Request for {} failed: {}", key, err);
                entry.status = EntryStatus::Failed;
                entry.data = None;
                entry.error = Some(err.clone());
                None
            }
        }
    };

    if let (Some(storage), Some((data, fetched_at))) = (storage, persist) {
        let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = storage.put(key, &data, fetched_at) {
            warn!("Failed to persist cache entry for {}: {}", key, e);
        }
    }
}
