//! Reuse cache with at-most-one fetch per key
//!
//! Entries start as a shared in-flight fetch and become a resolved handle once
//! the fetch succeeds. Every request for the same [`CacheKey`], concurrent or
//! later, observes that single result. Failed fetches are purged so the next
//! request starts over. Nothing is ever evicted.

pub mod metrics;
pub mod usage;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::error::FetchError;
use crate::key::CacheKey;
use crate::request::Delivery;
use metrics::ReuseMetricsHandle;
use usage::UsageTicket;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>, FetchError>>>;

enum CacheEntry<T> {
    Pending(SharedFetch<T>),
    Resolved(Arc<T>),
}

/// Observable state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Resolved,
}

enum Lookup<T> {
    Ready(Arc<T>),
    Pending(SharedFetch<T>),
}

/// A fetch result handed to one requester, together with its usage ticket
#[derive(Debug)]
pub struct Reused<T> {
    data: Arc<T>,
    ticket: UsageTicket,
}

impl<T> Reused<T> {
    pub fn data(&self) -> &Arc<T> {
        &self.data
    }

    /// Release the usage ticket and decide how the data may be handed over
    ///
    /// Call this right before delivering: the requester that brings the
    /// usage count to zero gets [`Delivery::Transferred`].
    pub fn into_parts(self) -> (Arc<T>, Delivery) {
        let delivery = if self.ticket.release() {
            Delivery::Transferred
        } else {
            Delivery::Shared
        };
        (self.data, delivery)
    }
}

/// Maps cache keys to in-flight or completed fetches
pub struct ReuseCache<T> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<T>>>,
    metrics: ReuseMetricsHandle,
}

impl<T> Default for ReuseCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics: ReuseMetricsHandle::new(),
        }
    }
}

impl<T> std::fmt::Debug for ReuseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReuseCache")
            .field("entries", &self.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl<T> ReuseCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to the metrics handle
    pub fn metrics(&self) -> &ReuseMetricsHandle {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn state(&self, key: &CacheKey) -> Option<EntryState> {
        self.entries.lock().get(key).map(|entry| match entry {
            CacheEntry::Pending(_) => EntryState::Pending,
            CacheEntry::Resolved(_) => EntryState::Resolved,
        })
    }
}

impl<T: Send + Sync + 'static> ReuseCache<T> {
    /// Serve the ticket's key from the cache, running `fetch` only if nothing
    /// is cached or in flight
    ///
    /// The caller acquires `ticket` when the request is accepted, so every
    /// accepted request is counted before any fetch can resolve. The ticket
    /// stays held by the returned [`Reused`] until it is consumed. On failure
    /// the ticket is released here and the entry is purged.
    ///
    /// `fetch` is invoked under the cache lock and must only build the future,
    /// not poll it or touch this cache.
    pub async fn reuse<F, Fut>(
        &self,
        ticket: UsageTicket,
        fetch: F,
    ) -> Result<Reused<T>, FetchError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let key = ticket.key().clone();

        let pending = match self.lookup_or_insert(&key, fetch) {
            Lookup::Ready(data) => return Ok(Reused { data, ticket }),
            Lookup::Pending(pending) => pending,
        };

        let result = pending.clone().await;
        self.settle(&key, &pending, &result);

        result.map(|data| Reused { data, ticket })
    }

    fn lookup_or_insert<F, Fut>(&self, key: &CacheKey, fetch: F) -> Lookup<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(CacheEntry::Resolved(data)) => {
                self.metrics.record_hit();
                log::debug!("Reusing resolved {key}");
                return Lookup::Ready(Arc::clone(data));
            }
            Some(CacheEntry::Pending(pending)) => {
                self.metrics.record_coalesced();
                log::debug!("Joining in-flight fetch of {key}");
                return Lookup::Pending(pending.clone());
            }
            None => {}
        }

        self.metrics.record_miss();
        log::debug!("Fetching {key}");

        let fetch = fetch();
        let metrics = self.metrics.clone();
        let fetch_key = key.clone();
        let pending = async move {
            let start_time = Instant::now();
            match fetch.await {
                Ok(data) => {
                    let elapsed = start_time.elapsed();
                    log::debug!("Fetched {fetch_key} in {elapsed:?}");
                    metrics.record_fetch_time(fetch_key, elapsed);
                    Ok(Arc::new(data))
                }
                Err(err) => {
                    metrics.record_failure();
                    log::warn!("Fetch of {fetch_key} failed: {err:#}");
                    Err(FetchError::new(err))
                }
            }
        }
        .boxed()
        .shared();

        entries.insert(key.clone(), CacheEntry::Pending(pending.clone()));
        Lookup::Pending(pending)
    }

    // Every awaiter settles; only the first one to see its own fetch still
    // pending changes the entry.
    fn settle(
        &self,
        key: &CacheKey,
        pending: &SharedFetch<T>,
        result: &Result<Arc<T>, FetchError>,
    ) {
        let mut entries = self.entries.lock();

        let still_pending = matches!(
            entries.get(key),
            Some(CacheEntry::Pending(current)) if current.ptr_eq(pending)
        );
        if !still_pending {
            return;
        }

        match result {
            Ok(data) => {
                entries.insert(key.clone(), CacheEntry::Resolved(Arc::clone(data)));
            }
            Err(_) => {
                entries.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::usage::UsageTracker;
    use crate::key::derive_key;
    use crate::request::{ResourceKind, Variant};
    use futures::executor::block_on;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(locator: &str) -> CacheKey {
        derive_key(ResourceKind::Texture, locator, &Variant::new())
    }

    #[test]
    fn test_cache_creation() {
        let cache = ReuseCache::<Vec<u8>>::new();
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_concurrent_requests_share_one_fetch() {
        let cache = ReuseCache::<Vec<u8>>::new();
        let usage = Arc::new(UsageTracker::new());
        let fetches = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = futures::channel::oneshot::channel::<()>();
        let gate = gate_rx.shared();

        let requests = (0..4).map(|_| {
            let fetches = Arc::clone(&fetches);
            let gate = gate.clone();
            cache.reuse(usage.acquire(&key("a")), move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                let _ = gate.await;
                Ok(vec![1, 2, 3])
            })
        });

        let results = block_on(async {
            let all = join_all(requests);
            futures::pin_mut!(all);
            assert!(futures::poll!(all.as_mut()).is_pending());
            assert_eq!(usage.count(&key("a")), 4);
            gate_tx.send(()).unwrap();
            all.await
        });

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(cache.metrics().misses(), 1);
        assert_eq!(cache.metrics().coalesced(), 3);

        let reused: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        let first = Arc::clone(reused[0].data());
        let deliveries: Vec<_> = reused
            .into_iter()
            .map(|r| {
                let (data, delivery) = r.into_parts();
                assert!(Arc::ptr_eq(&data, &first));
                delivery
            })
            .collect();

        assert_eq!(
            deliveries,
            vec![
                Delivery::Shared,
                Delivery::Shared,
                Delivery::Shared,
                Delivery::Transferred
            ]
        );
        assert_eq!(usage.count(&key("a")), 0);
        assert_eq!(cache.state(&key("a")), Some(EntryState::Resolved));
    }

    #[test]
    fn test_resolved_entry_is_reused() {
        let cache = ReuseCache::<u32>::new();
        let usage = Arc::new(UsageTracker::new());

        let ticket = usage.acquire(&key("a"));
        let first = block_on(cache.reuse(ticket, || async { Ok(7) })).unwrap();
        let (_, delivery) = first.into_parts();
        assert_eq!(delivery, Delivery::Transferred);

        let second = block_on(cache.reuse(usage.acquire(&key("a")), || async {
            anyhow::bail!("must not fetch twice")
        }))
        .unwrap();
        assert_eq!(**second.data(), 7);
        assert_eq!(cache.metrics().hits(), 1);
    }

    #[test]
    fn test_failed_fetch_is_purged_and_retried() {
        let cache = ReuseCache::<u32>::new();
        let usage = Arc::new(UsageTracker::new());

        let err = block_on(cache.reuse(usage.acquire(&key("a")), || async {
            anyhow::bail!("connection reset")
        }))
        .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(cache.state(&key("a")), None);
        assert_eq!(usage.count(&key("a")), 0);
        assert_eq!(cache.metrics().failures(), 1);

        let ticket = usage.acquire(&key("a"));
        let retried = block_on(cache.reuse(ticket, || async { Ok(3) })).unwrap();
        assert_eq!(**retried.data(), 3);
        assert_eq!(cache.metrics().misses(), 2);
    }

    #[test]
    fn test_failure_reaches_every_waiter() {
        let cache = ReuseCache::<u32>::new();
        let usage = Arc::new(UsageTracker::new());

        let (gate_tx, gate_rx) = futures::channel::oneshot::channel::<()>();
        let gate = gate_rx.shared();

        let results = block_on(async {
            let all = join_all((0..3).map(|_| {
                let gate = gate.clone();
                cache.reuse(usage.acquire(&key("broken")), move || async move {
                    let _ = gate.await;
                    anyhow::bail!("decode error")
                })
            }));
            futures::pin_mut!(all);
            assert!(futures::poll!(all.as_mut()).is_pending());
            gate_tx.send(()).unwrap();
            all.await
        });

        assert!(results.iter().all(Result::is_err));
        assert_eq!(cache.metrics().misses(), 1);
        assert!(cache.is_empty());
        assert_eq!(usage.active_keys(), 0);
    }
}
