//! Outstanding-request counting per cache key
//!
//! Every request that reaches the cache holds a [`UsageTicket`] until its
//! response is delivered. Releasing the ticket that brings the count to zero
//! marks the last consumer of a fetch result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::key::CacheKey;

/// Per-key count of requests that have not been answered yet
#[derive(Debug, Default)]
pub struct UsageTracker {
    counts: Mutex<HashMap<CacheKey, usize>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new outstanding request for `key`
    pub fn acquire(self: &Arc<Self>, key: &CacheKey) -> UsageTicket {
        *self.counts.lock().entry(key.clone()).or_insert(0) += 1;

        UsageTicket {
            tracker: Arc::clone(self),
            key: key.clone(),
            released: false,
        }
    }

    /// Outstanding requests for `key`
    pub fn count(&self, key: &CacheKey) -> usize {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Number of keys with outstanding requests
    pub fn active_keys(&self) -> usize {
        self.counts.lock().len()
    }

    // Returns true when this was the last outstanding request for the key.
    fn release(&self, key: &CacheKey) -> bool {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(key) else {
            // Tickets are the only way to decrement; a missing entry is a bug here.
            log::error!("Usage released for untracked key {key}");
            return true;
        };

        *count -= 1;
        if *count == 0 {
            counts.remove(key);
            true
        } else {
            false
        }
    }
}

/// Proof of one outstanding request; released on delivery or drop
#[derive(Debug)]
pub struct UsageTicket {
    tracker: Arc<UsageTracker>,
    key: CacheKey,
    released: bool,
}

impl UsageTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Release the ticket, returning true if it was the last one for its key
    pub fn release(mut self) -> bool {
        self.released = true;
        self.tracker.release(&self.key)
    }
}

impl Drop for UsageTicket {
    fn drop(&mut self) {
        if !self.released {
            self.tracker.release(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::derive_key;
    use crate::request::{ResourceKind, Variant};

    fn key(locator: &str) -> CacheKey {
        derive_key(ResourceKind::Texture, locator, &Variant::new())
    }

    #[test]
    fn test_last_release_is_flagged() {
        let usage = Arc::new(UsageTracker::new());
        let first = usage.acquire(&key("a"));
        let second = usage.acquire(&key("a"));
        assert_eq!(usage.count(&key("a")), 2);

        assert!(!first.release());
        assert!(second.release());
        assert_eq!(usage.count(&key("a")), 0);
        assert_eq!(usage.active_keys(), 0);
    }

    #[test]
    fn test_keys_are_counted_independently() {
        let usage = Arc::new(UsageTracker::new());
        let a = usage.acquire(&key("a"));
        let b = usage.acquire(&key("b"));

        assert!(a.release());
        assert_eq!(usage.count(&key("b")), 1);
        assert!(b.release());
    }

    #[test]
    fn test_dropped_ticket_releases() {
        let usage = Arc::new(UsageTracker::new());
        {
            let _ticket = usage.acquire(&key("a"));
            assert_eq!(usage.count(&key("a")), 1);
        }
        assert_eq!(usage.count(&key("a")), 0);
    }
}
