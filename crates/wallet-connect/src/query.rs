//! Keyed cache of asynchronous queries.
//!
//! Every entry is identified by a [`QueryKey`] (operation tag plus parameters)
//! and moves through an explicit state machine:
//!
//! ```text
//! Idle ──fetch──▶ Loading ──▶ Success
//!                    ▲    └──▶ Error
//!                    └── refetch / invalidate / poll tick (from Success or Error)
//! ```
//!
//! The last successful value survives while a refetch is loading and after a
//! failed refetch, so invalidating an entry never blanks what is displayed
//! until a new value arrives. [`QueryCache::reset`] and
//! [`QueryCache::set_data`] bump the entry generation; a fetch that started
//! before either completes into the void.
//!
//! Polls ([`QueryCache::poll`]) issue the next request only after the previous
//! one has resolved, and are torn down by [`PollHandle::cancel`] or by dropping
//! the handle.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Result, WalletError};

pub type QueryValue = Arc<dyn Any + Send + Sync>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<QueryValue>> + Send + Sync>;

/// Tags of the queries the client issues.
pub mod tags {
    pub const ACCOUNTS: &str = "eth_requestAccounts";
    pub const NATIVE_BALANCE: &str = "eth_getBalance";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
    pub const CONTRACT_INFO: &str = "contract_get_info";
    pub const CONTRACT_BALANCE: &str = "contract_balance";
    pub const CONTRACT_TRANSFER: &str = "send_transaction_to_contract";
}

/// Operation tag plus parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub tag: String,
    pub params: Vec<String>,
}

impl QueryKey {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        for param in &self.params {
            write!(f, "/{param}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Whether reads and invalidations may fetch on their own. Disabled
    /// queries still fetch on an explicit [`QueryCache::refetch`].
    pub enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl QueryOptions {
    pub fn manual() -> Self {
        Self { enabled: false }
    }
}

/// Point-in-time view of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    pub stale: bool,
    pub has_data: bool,
    pub error: Option<String>,
    pub observers: usize,
    pub poll_interval: Option<Duration>,
    pub updated_at: Option<Instant>,
}

impl QuerySnapshot {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

struct Entry {
    status: QueryStatus,
    data: Option<QueryValue>,
    error: Option<String>,
    stale: bool,
    observers: usize,
    options: QueryOptions,
    fetcher: Option<Fetcher>,
    generation: u64,
    poll_interval: Option<Duration>,
    updated_at: Option<Instant>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            stale: false,
            observers: 0,
            options: QueryOptions::default(),
            fetcher: None,
            generation: 0,
            poll_interval: None,
            updated_at: None,
        }
    }
}

impl Entry {
    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            status: self.status,
            stale: self.stale,
            has_data: self.data.is_some(),
            error: self.error.clone(),
            observers: self.observers,
            poll_interval: self.poll_interval,
            updated_at: self.updated_at,
        }
    }

    fn clear(&mut self) {
        self.status = QueryStatus::Idle;
        self.data = None;
        self.error = None;
        self.stale = false;
        self.updated_at = None;
        self.generation += 1;
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    changes: watch::Sender<u64>,
}

/// Shared handle to the cache; clones see the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.lock().len())
            .finish()
    }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, value: &QueryValue) -> Result<T> {
    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| WalletError::Decode(format!("query {key} holds a different type")))
}

impl QueryCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                changes,
            }),
        }
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|version| *version += 1);
    }

    /// Installs (or replaces) the fetch function and options for `key`.
    /// Cached data is kept.
    pub fn register<T, F, Fut>(&self, key: &QueryKey, options: QueryOptions, fetch: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let fut = fetch();
            async move { fut.await.map(|value| Arc::new(value) as QueryValue) }.boxed()
        });

        let mut entries = self.inner.entries.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.options = options;
        entry.fetcher = Some(fetcher);
    }

    pub fn is_registered(&self, key: &QueryKey) -> bool {
        self.inner
            .entries
            .lock()
            .get(key)
            .is_some_and(|entry| entry.fetcher.is_some())
    }

    async fn run_fetch(&self, key: &QueryKey) -> Result<QueryValue> {
        let (fetcher, generation) = {
            let mut entries = self.inner.entries.lock();
            let entry = entries
                .get_mut(key)
                .ok_or_else(|| WalletError::Config(format!("query {key} is not registered")))?;
            let fetcher = entry
                .fetcher
                .clone()
                .ok_or_else(|| WalletError::Config(format!("query {key} has no fetch function")))?;
            entry.status = QueryStatus::Loading;
            (fetcher, entry.generation)
        };
        trace!(%key, "query loading");
        self.notify();

        let result = fetcher().await;
        self.settle(key, generation, result)
    }

    fn settle(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<QueryValue>,
    ) -> Result<QueryValue> {
        {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.get_mut(key).filter(|e| e.generation == generation) else {
                debug!(%key, "discarding result of a query reset while in flight");
                return Err(WalletError::Cancelled);
            };

            match &result {
                Ok(value) => {
                    entry.status = QueryStatus::Success;
                    entry.data = Some(value.clone());
                    entry.error = None;
                    entry.stale = false;
                    entry.updated_at = Some(Instant::now());
                    trace!(%key, "query succeeded");
                }
                Err(e) => {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(e.to_string());
                    debug!(%key, error = %e, "query failed");
                }
            }
        }
        self.notify();
        result
    }

    /// Fetches `key` now, regardless of `enabled`, and returns the new value.
    pub async fn refetch<T>(&self, key: &QueryKey) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = self.run_fetch(key).await?;
        downcast(key, &value)
    }

    /// Returns cached data, fetching first when the entry is enabled and has
    /// no fresh value. Disabled entries never fetch here.
    pub async fn query<T>(&self, key: &QueryKey) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let needs_fetch = {
            let entries = self.inner.entries.lock();
            match entries.get(key) {
                Some(entry) => {
                    entry.options.enabled
                        && entry.fetcher.is_some()
                        && (entry.data.is_none() || entry.stale)
                }
                None => false,
            }
        };

        if needs_fetch {
            return self.refetch(key).await.map(Some);
        }
        Ok(self.get_data(key))
    }

    /// Cached data without fetching.
    pub fn get_data<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.inner.entries.lock();
        let value = entries.get(key)?.data.as_ref()?;
        match downcast(key, value) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!(%key, error = %e, "cached value has unexpected type");
                None
            }
        }
    }

    /// Writes a value directly, as if a fetch had succeeded. Creates the
    /// entry if needed; in-flight fetches for it are discarded.
    pub fn set_data<T>(&self, key: &QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.clone()).or_default();
            entry.generation += 1;
            entry.status = QueryStatus::Success;
            entry.data = Some(Arc::new(value));
            entry.error = None;
            entry.stale = false;
            entry.updated_at = Some(Instant::now());
        }
        trace!(%key, "query data set");
        self.notify();
    }

    /// Marks `key` stale. When the entry is enabled and observed, a refetch is
    /// spawned on the current runtime; returns whether that happened.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let should_refetch = {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            entry.stale = true;
            entry.options.enabled && entry.observers > 0 && entry.fetcher.is_some()
        };
        debug!(%key, refetch = should_refetch, "query invalidated");
        self.notify();

        if !should_refetch {
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%key, "no async runtime; refetch deferred to next read");
            return false;
        };

        let cache = self.clone();
        let key = key.clone();
        runtime.spawn(async move {
            if let Err(e) = cache.run_fetch(&key).await {
                debug!(%key, error = %e, "background refetch failed");
            }
        });
        true
    }

    /// Invalidates every entry carrying `tag`, whatever its parameters.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let keys: Vec<QueryKey> = self
            .inner
            .entries
            .lock()
            .keys()
            .filter(|key| key.tag == tag)
            .cloned()
            .collect();
        for key in &keys {
            self.invalidate(key);
        }
        keys.len()
    }

    /// Clears data and error of the given entries (all entries for `None`),
    /// returning them to `Idle`. Fetch functions and observers are kept.
    pub fn reset(&self, keys: Option<&[QueryKey]>) {
        {
            let mut entries = self.inner.entries.lock();
            match keys {
                Some(keys) => {
                    for key in keys {
                        if let Some(entry) = entries.get_mut(key) {
                            entry.clear();
                        }
                    }
                }
                None => entries.values_mut().for_each(Entry::clear),
            }
        }
        debug!(count = keys.map_or(0, <[QueryKey]>::len), all = keys.is_none(), "queries reset");
        self.notify();
    }

    /// Clears every entry with `tag`.
    pub fn reset_tag(&self, tag: &str) {
        let keys: Vec<QueryKey> = self
            .inner
            .entries
            .lock()
            .keys()
            .filter(|key| key.tag == tag)
            .cloned()
            .collect();
        self.reset(Some(&keys));
    }

    pub fn snapshot(&self, key: &QueryKey) -> QuerySnapshot {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(Entry::snapshot)
            .unwrap_or_else(|| Entry::default().snapshot())
    }

    /// Registers interest in `key` until the returned [`Observer`] is dropped.
    pub fn observe(&self, key: &QueryKey) -> Observer {
        self.inner
            .entries
            .lock()
            .entry(key.clone())
            .or_default()
            .observers += 1;

        Observer {
            cache: self.clone(),
            key: key.clone(),
            changes: self.inner.changes.subscribe(),
        }
    }

    fn set_poll_interval(&self, key: &QueryKey, interval: Option<Duration>) {
        if let Some(entry) = self.inner.entries.lock().get_mut(key) {
            entry.poll_interval = interval;
        }
    }

    /// Registers `fetch` under `key` and re-runs it every `interval` until
    /// `until` accepts a value.
    ///
    /// The next request is only issued after the previous one resolved, so at
    /// most one is in flight. Fetch errors are logged and polling continues.
    pub fn poll<T, F, Fut, P>(
        &self,
        key: &QueryKey,
        interval: Duration,
        fetch: F,
        until: P,
    ) -> PollHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        P: Fn(&T) -> bool + Send + 'static,
    {
        self.register(key, QueryOptions::default(), fetch);
        self.set_poll_interval(key, Some(interval));

        let cache = self.clone();
        let poll_key = key.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = 0u64;
            loop {
                ticks += 1;
                match cache.refetch::<T>(&poll_key).await {
                    Ok(value) if until(&value) => {
                        debug!(key = %poll_key, ticks, "poll condition met");
                        cache.set_poll_interval(&poll_key, None);
                        return value;
                    }
                    Ok(_) => trace!(key = %poll_key, ticks, "poll condition not met"),
                    Err(e) => debug!(key = %poll_key, ticks, error = %e, "poll request failed"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        PollHandle {
            cache: self.clone(),
            key: key.clone(),
            handle: Some(handle),
        }
    }
}

/// Interest in one entry. Dropping it releases the interest.
pub struct Observer {
    cache: QueryCache,
    key: QueryKey,
    changes: watch::Receiver<u64>,
}

impl Observer {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        self.cache.snapshot(&self.key)
    }

    pub fn data<T>(&self) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.cache.get_data(&self.key)
    }

    /// Resolves on the next change anywhere in the cache.
    pub async fn changed(&mut self) {
        // The sender lives as long as the cache this observer holds.
        let _ = self.changes.changed().await;
    }

    /// Waits until this entry leaves `Loading` with a fresh result.
    pub async fn settled(&mut self) -> QuerySnapshot {
        loop {
            let snapshot = self.snapshot();
            if matches!(snapshot.status, QueryStatus::Success | QueryStatus::Error)
                && !(snapshot.status == QueryStatus::Success && snapshot.stale)
            {
                return snapshot;
            }
            self.changed().await;
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if let Some(entry) = self.cache.inner.entries.lock().get_mut(&self.key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }
}

/// A running poll. Dropping the handle cancels the poll.
pub struct PollHandle<T> {
    cache: QueryCache,
    key: QueryKey,
    handle: Option<JoinHandle<T>>,
}

impl<T> PollHandle<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops polling; no further requests are issued.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.cache.set_poll_interval(&self.key, None);
            debug!(key = %self.key, "poll cancelled");
        }
    }

    /// Waits for the value that satisfied the poll condition.
    pub async fn wait(mut self) -> Result<T> {
        let handle = self.handle.take().ok_or(WalletError::Cancelled)?;
        handle.await.map_err(|e| {
            if e.is_cancelled() {
                WalletError::Cancelled
            } else {
                WalletError::Submission(format!("poll task failed: {e}"))
            }
        })
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
